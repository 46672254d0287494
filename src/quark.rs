use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Lookup between state ids and their names.
pub trait StringTable {
    fn to_str(&self, id: usize) -> Option<&str>;
    fn to_id(&self, s: &str) -> Option<usize>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait TextVectorizer {
    fn find_or_insert(&mut self, key: &str) -> usize;
}

/// Interned state names, ids assigned in first-seen order.
///
/// Serialised as the plain list of names; the reverse map is rebuilt on load
/// and a list naming a state twice is rejected.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Quark {
    v: Vec<String>,
    m: HashMap<String, usize>,
}

impl TryFrom<Vec<String>> for Quark {
    type Error = Error;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        let mut quark = Quark::default();
        for (i, s) in value.iter().enumerate() {
            if quark.find_or_insert(s) != i {
                return Err(Error::InvalidInput(format!("duplicate state name {s:?} at {i}")));
            }
        }
        Ok(quark)
    }
}

impl From<Quark> for Vec<String> {
    fn from(value: Quark) -> Self {
        value.v
    }
}

impl StringTable for Quark {
    fn to_str(&self, id: usize) -> Option<&str> {
        self.v.get(id).map(|x| x.as_str())
    }

    fn to_id(&self, s: &str) -> Option<usize> {
        self.m.get(s).copied()
    }

    fn len(&self) -> usize {
        self.v.len()
    }
}

impl TextVectorizer for Quark {
    fn find_or_insert(&mut self, key: &str) -> usize {
        if let Some(&id) = self.m.get(key) {
            return id;
        }
        let id = self.v.len();
        self.m.insert(key.to_string(), id);
        self.v.push(key.to_string());
        id
    }
}

impl Quark {
    /// Names for `n` anonymous states: `"0"`, `"1"`, ...
    pub fn numbered(n: usize) -> Self {
        let mut quark = Quark::default();
        for i in 0..n {
            quark.find_or_insert(&i.to_string());
        }
        quark
    }

    /// Maps a path of state ids to names, unknown ids become `"N/A"`.
    pub fn decode_path<'a>(&'a self, path: &[usize]) -> Vec<&'a str> {
        path.iter().map(|&i| self.to_str(i).unwrap_or("N/A")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_by_str() {
        let mut quark = Quark::default();
        for (s, id) in [("B", 0), ("I", 1), ("O", 2), ("I", 1), ("B", 0), ("E", 3)] {
            assert_eq!(id, quark.find_or_insert(s), "{} != {}", s, id);
        }
        assert_eq!(quark.to_id("O"), Some(2));
        assert_eq!(quark.to_id("S"), None);
    }

    #[test]
    fn decode_path() {
        let quark = Quark::try_from(vec!["exon".to_string(), "intron".to_string()]).unwrap();
        assert_eq!(quark.decode_path(&[0, 1, 1, 5]), vec!["exon", "intron", "intron", "N/A"]);
    }

    #[test]
    fn serde_as_list() {
        let quark = Quark::numbered(3);
        let s = serde_json::to_string(&quark).unwrap();
        assert_eq!(s, r#"["0","1","2"]"#);
        let back: Quark = serde_json::from_str(&s).unwrap();
        assert_eq!(back.to_id("2"), Some(2));
    }

    #[test]
    fn duplicate_names_rejected() {
        let ret = serde_json::from_str::<Quark>(r#"["exon","intron","exon"]"#);
        assert!(ret.is_err());
        let ret = Quark::try_from(vec!["a".to_string(), "a".to_string()]);
        assert!(matches!(ret, Err(Error::InvalidInput(..))));
    }
}
