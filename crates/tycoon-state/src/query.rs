#![forbid(unsafe_code)]

//! Query-string topic.
//!
//! Pages filter their lists from the location's query string
//! (`?sector=retail&sort=cash`). The topic carries no payload: on
//! notification an observer re-derives its view from [`QueryTopic::params`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tycoon_reactive::{NotifyReport, Observer, Subscription, Topic};

/// Decoded `key=value` pairs in query-string order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a query string, with or without the leading `?`.
    ///
    /// `+` decodes to a space and `%XX` to the byte it names; a malformed
    /// escape is kept as written. Empty segments are skipped and a segment
    /// without `=` gets an empty value. Repeated keys are all kept.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = query
            .split('&')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self { pairs }
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Whether `key` appears at all.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// All pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            f.write_str(if i == 0 { "?" } else { "&" })?;
            encode_into(f, key)?;
            f.write_str("=")?;
            encode_into(f, value)?;
        }
        Ok(())
    }
}

fn decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (bytes.get(i + 1).and_then(hex), bytes.get(i + 2).and_then(hex)) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex(b: &u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn encode_into(f: &mut fmt::Formatter<'_>, raw: &str) -> fmt::Result {
    for b in raw.bytes() {
        match b {
            b' ' => f.write_str("+")?,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                write!(f, "{}", b as char)?;
            }
            _ => write!(f, "%{b:02X}")?,
        }
    }
    Ok(())
}

/// Payload-less topic over the ambient query parameters.
#[derive(Clone)]
pub struct QueryTopic {
    params: Rc<RefCell<QueryParams>>,
    topic: Topic<()>,
}

impl fmt::Debug for QueryTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTopic")
            .field("params", &self.params.borrow())
            .field("subscribers", &self.topic.subscriber_count())
            .finish()
    }
}

impl Default for QueryTopic {
    fn default() -> Self {
        Self::new(QueryParams::default())
    }
}

impl QueryTopic {
    /// Topic starting from `params`.
    #[must_use]
    pub fn new(params: QueryParams) -> Self {
        Self {
            params: Rc::new(RefCell::new(params)),
            topic: Topic::new("query", ()),
        }
    }

    /// Topic starting from a raw query string.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        Self::new(QueryParams::parse(query))
    }

    /// Clone of the current parameters.
    #[must_use]
    pub fn params(&self) -> QueryParams {
        self.params.borrow().clone()
    }

    /// Read the current parameters by reference.
    pub fn with_params<R>(&self, read: impl FnOnce(&QueryParams) -> R) -> R {
        read(&self.params.borrow())
    }

    /// Replace the parameters from `query` and tell every observer.
    pub fn navigate(&self, query: &str) -> NotifyReport {
        let params = QueryParams::parse(query);
        tracing::debug!(query = %params, "navigate");
        *self.params.borrow_mut() = params;
        self.topic.notify_all()
    }

    /// Underlying topic.
    #[must_use]
    pub fn topic(&self) -> &Topic<()> {
        &self.topic
    }

    /// Register an observer.
    pub fn subscribe<O: Observer<()> + 'static>(&self, observer: &Rc<O>) -> bool {
        self.topic.subscribe(observer)
    }

    /// Remove an observer.
    pub fn unsubscribe<O: Observer<()> + ?Sized>(&self, observer: &Rc<O>) -> bool {
        self.topic.unsubscribe(observer)
    }

    /// Register a closure.
    pub fn subscribe_fn(&self, callback: impl Fn(&()) + 'static) -> Subscription {
        self.topic.subscribe_fn(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tycoon_reactive::ObserverError;

    #[test]
    fn parse_basic() {
        let p = QueryParams::parse("?sector=retail&sort=cash");
        assert_eq!(p.get("sector"), Some("retail"));
        assert_eq!(p.get("sort"), Some("cash"));
        assert_eq!(p.get("missing"), None);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn parse_decodes_plus_and_percent() {
        let p = QueryParams::parse("name=Acme+Corp&q=50%25%20off");
        assert_eq!(p.get("name"), Some("Acme Corp"));
        assert_eq!(p.get("q"), Some("50% off"));
    }

    #[test]
    fn parse_keeps_malformed_escapes() {
        let p = QueryParams::parse("a=%zz&b=%4");
        assert_eq!(p.get("a"), Some("%zz"));
        assert_eq!(p.get("b"), Some("%4"));
    }

    #[test]
    fn parse_edge_segments() {
        let p = QueryParams::parse("&&flag&tag=a&tag=b&");
        assert!(p.contains("flag"));
        assert_eq!(p.get("flag"), Some(""));
        assert_eq!(p.get_all("tag"), vec!["a", "b"]);
        assert!(QueryParams::parse("").is_empty());
        assert!(QueryParams::parse("?").is_empty());
    }

    #[test]
    fn display_encodes() {
        let p = QueryParams::parse("name=Acme+Corp&q=a%26b");
        assert_eq!(p.to_string(), "?name=Acme+Corp&q=a%26b");
        assert_eq!(QueryParams::default().to_string(), "");
    }

    #[test]
    fn observers_rederive_on_navigate() {
        struct SectorFilter {
            query: QueryTopic,
            companies: Vec<(&'static str, &'static str)>,
            visible: RefCell<Vec<&'static str>>,
        }
        impl Observer<()> for SectorFilter {
            fn update(&self, _: &()) -> Result<(), ObserverError> {
                let sector = self.query.with_params(|p| p.get("sector").map(str::to_owned));
                *self.visible.borrow_mut() = self
                    .companies
                    .iter()
                    .filter(|(_, s)| sector.as_deref().is_none_or(|want| want == *s))
                    .map(|(name, _)| *name)
                    .collect();
                Ok(())
            }
        }

        let query = QueryTopic::from_query("?sort=cash");
        let filter = Rc::new(SectorFilter {
            query: query.clone(),
            companies: vec![("Acme", "retail"), ("Borealis", "energy"), ("Cobalt", "retail")],
            visible: RefCell::new(Vec::new()),
        });
        query.subscribe(&filter);

        query.navigate("?sector=retail");
        assert_eq!(*filter.visible.borrow(), vec!["Acme", "Cobalt"]);

        query.navigate("");
        assert_eq!(filter.visible.borrow().len(), 3);
        assert!(query.params().is_empty());
    }
}
