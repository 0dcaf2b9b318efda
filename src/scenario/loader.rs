// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Directory of scenario files

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::ScenarioDefinition;
use crate::error::{SimulationError, SimulationResult};

/// Summary of a scenario, as shown by `--list-scenarios`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioInfo {
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
}

/// Finds `<name>.json` files in a directory and caches the parsed scenarios
#[derive(Debug)]
pub struct ScenarioLoader {
    dir: PathBuf,
    available: Vec<String>,
    cache: HashMap<String, Arc<ScenarioDefinition>>,
}

impl ScenarioLoader {
    /// Create a loader and scan `dir`. A missing directory yields no scenario.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let mut loader = Self {
            dir: dir.as_ref().to_path_buf(),
            available: Vec::new(),
            cache: HashMap::new(),
        };
        loader.scan();
        loader
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scan(&mut self) {
        self.available.clear();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Scenario directory {} not readable: {}", self.dir.display(), e);
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                self.available.push(stem.to_string());
            }
        }
        self.available.sort();
        debug!(
            "Found {} scenario(s) in {}",
            self.available.len(),
            self.dir.display()
        );
    }

    /// Sorted names of the scenarios found in the directory
    pub fn list(&self) -> &[String] {
        &self.available
    }

    /// Parse (or fetch from cache) the scenario `name`
    pub fn load(&mut self, name: &str) -> SimulationResult<Arc<ScenarioDefinition>> {
        if let Some(scenario) = self.cache.get(name) {
            return Ok(Arc::clone(scenario));
        }
        if !self.available.iter().any(|n| n == name) {
            return Err(SimulationError::config(format!(
                "scenario '{}' not found in {}",
                name,
                self.dir.display()
            )));
        }
        let path = self.dir.join(format!("{}.json", name));
        let scenario = Arc::new(ScenarioDefinition::from_file(&path)?);
        info!(
            "Loaded scenario '{}' from {} ({} cells)",
            scenario.name,
            path.display(),
            scenario.cell_count()
        );
        self.cache.insert(name.to_string(), Arc::clone(&scenario));
        Ok(scenario)
    }

    pub fn info(&mut self, name: &str) -> SimulationResult<ScenarioInfo> {
        Ok(self.load(name)?.info())
    }

    /// Rescan the directory and forget every cached scenario
    pub fn reload(&mut self) {
        self.cache.clear();
        self.scan();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scan_lists_json_files_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.json"), r#"{"name": "B"}"#).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"name": "A", "author": "me"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut loader = ScenarioLoader::new(dir.path());
        assert_eq!(loader.list(), &["a".to_string(), "b".to_string()]);
        let info = loader.info("a").unwrap();
        assert_eq!(info.author, "me");
        assert_eq!(info.version, "1.0");
    }

    #[test]
    fn test_missing_scenario_and_reload() {
        let dir = tempdir().unwrap();
        let mut loader = ScenarioLoader::new(dir.path());
        assert!(loader.load("late").is_err());

        fs::write(dir.path().join("late.json"), r#"{"name": "Late"}"#).unwrap();
        loader.reload();
        assert_eq!(loader.load("late").unwrap().name, "Late");
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let loader = ScenarioLoader::new("/nonexistent/scenarios");
        assert!(loader.list().is_empty());
    }
}
