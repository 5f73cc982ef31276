use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AvisetError;

/// A bird species, normalized to its category key: lowercase, spaces
/// replaced by underscores. One category maps to one ledger file and one
/// image directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category(String);

impl Category {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Search term sent to the provider (underscores back to spaces).
    pub fn search_term(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Category {
    type Err = AvisetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace(' ', "_");
        if normalized.is_empty() {
            return Err(AvisetError::InvalidCategory(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Media type inferred from a URL. Closed set: anything that is not
/// recognizably png or jpeg is dropped before download and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Png,
    Jpeg,
}

impl MediaType {
    pub fn extension(self) -> &'static str {
        match self {
            MediaType::Png => "png",
            MediaType::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Case-insensitive substring classifier. URLs frequently carry query
/// strings after the real extension, so a plain suffix match would drop
/// usable items.
pub fn media_type_of(url: &str) -> Option<MediaType> {
    let lower = url.to_lowercase();
    if lower.contains(".png") {
        Some(MediaType::Png)
    } else if lower.contains(".jpg") || lower.contains(".jpeg") {
        Some(MediaType::Jpeg)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn category_normalizes() {
        let cat: Category = "Great Spotted Woodpecker".parse().unwrap();
        assert_eq!(cat.as_str(), "great_spotted_woodpecker");
        assert_eq!(cat.search_term(), "great spotted woodpecker");
    }

    #[test]
    fn category_rejects_empty() {
        let err = "   ".parse::<Category>().unwrap_err();
        assert_matches!(err, AvisetError::InvalidCategory(_));
    }

    #[test]
    fn media_type_inference() {
        assert_eq!(media_type_of("http://x/a.JPG"), Some(MediaType::Jpeg));
        assert_eq!(media_type_of("http://x/b.png"), Some(MediaType::Png));
        assert_eq!(media_type_of("http://x/c.webp"), None);
        assert_eq!(
            media_type_of("http://x/d.jpeg?width=800"),
            Some(MediaType::Jpeg)
        );
    }
}
