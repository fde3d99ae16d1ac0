/// URI template matching module
///
/// Parses URI templates made of literal and `{variable}` segments and
/// matches concrete request urls to the most specific registered template.
///
/// # Examples
///
/// ```
/// use permscope_permissions::template::TemplateTable;
///
/// let mut table = TemplateTable::new();
/// table.add("messages", "/users/{id}/messages").unwrap();
///
/// let matched = table.match_url("/users/12345/messages").unwrap().unwrap();
/// assert_eq!(matched.key, "messages");
/// assert_eq!(matched.bindings["id"], "12345");
/// ```

mod table;
mod types;


pub use table::{TemplateEntry, TemplateMatch, TemplateTable};
pub use types::{normalize_url, Segment, UriTemplate};
