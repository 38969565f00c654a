/// Requests the display controller can send up the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `REQ COMMANDS`
    Commands,
    /// `SELECT <id>`
    Select(String),
}

impl Request {
    /// Match one inbound line. Unknown lines yield `None` and are meant to be ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line == "REQ COMMANDS" {
            return Some(Request::Commands);
        }
        line.strip_prefix("SELECT ")
            .map(|id| Request::Select(id.trim().to_string()))
    }
}
