//! Saved paper sets, so a fetch can be replayed without hitting the sources.

use crate::paper::Paper;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

/// `<dir>/papers_<since>_<days>d.json`
pub fn snapshot_path(dir: &Path, since: NaiveDate, days: u32) -> PathBuf {
    dir.join(format!("papers_{}_{}d.json", since.format("%Y-%m-%d"), days))
}

pub fn save(papers: &[Paper], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating snapshot directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(papers)?;
    fs::write(path, json).with_context(|| format!("writing snapshot {}", path.display()))?;
    Ok(())
}

pub fn load(path: &Path) -> Result<Vec<Paper>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_encodes_window() {
        let since = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        assert_eq!(
            snapshot_path(Path::new("snaps"), since, 3),
            PathBuf::from("snaps/papers_2024-10-01_3d.json")
        );
    }

    #[test]
    fn saved_papers_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(&dir.path().join("nested"), NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(), 3);

        let mut paper = Paper::new("Deep learning for GWAS");
        paper.authors = vec!["Xihong Lin".into()];
        paper.push_affiliations(["Harvard University"]);
        paper.published = NaiveDate::from_ymd_opt(2024, 10, 2);

        save(&[paper.clone(), Paper::new("second")], &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, vec![paper, Paper::new("second")]);
    }

    #[test]
    fn missing_snapshot_names_the_file() {
        let err = load(Path::new("/nonexistent/papers.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/papers.json"));
    }
}
