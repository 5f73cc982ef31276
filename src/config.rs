use std::fs;
use std::path::Path;

use crate::domain::Category;
use crate::error::AvisetError;

/// Name of the env var consulted when no --api-key flag is given.
pub const API_KEY_ENV: &str = "AVISET_API_KEY";

/// Resolve the search credential before any loop starts. A missing key is a
/// configuration error, not something to discover mid-run.
pub fn resolve_api_key(flag: Option<String>) -> Result<String, AvisetError> {
    if let Some(key) = flag {
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(AvisetError::MissingApiKey),
    }
}

/// Read the species list file: first line is a header, every other line is
/// `localName,otherName,...`. Only the first field is used.
pub fn load_species(path: &Path) -> Result<Vec<Category>, AvisetError> {
    if !path.exists() {
        return Err(AvisetError::MissingSpeciesFile(path.to_path_buf()));
    }
    let content =
        fs::read_to_string(path).map_err(|_| AvisetError::SpeciesFileRead(path.to_path_buf()))?;

    let mut categories = Vec::new();
    for line in content.lines().skip(1) {
        let name = line.split(',').next().unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        categories.push(name.parse()?);
    }
    Ok(categories)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_species_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("birds.csv");
        fs::write(
            &path,
            "german,english\nAmsel,blackbird\nBlaumeise,blue tit\n\nGrosser Brachvogel,curlew\n",
        )
        .unwrap();

        let species = load_species(&path).unwrap();
        let names: Vec<&str> = species.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["amsel", "blaumeise", "grosser_brachvogel"]);
    }

    #[test]
    fn missing_species_file() {
        let err = load_species(Path::new("/nonexistent/birds.csv")).unwrap_err();
        assert_matches!(err, AvisetError::MissingSpeciesFile(_));
    }
}
