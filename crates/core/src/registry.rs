//! Knowledge Pillar Registry
//!
//! Loads pillar term sets from independent sources. Each source may fail on its
//! own; a failed source becomes an unavailable pillar that is kept for status
//! reporting while classification carries on with whatever did load. The
//! registry is immutable after [`Registry::load`] and is shared by reference
//! (usually behind an `Arc`) across every session in the process.

use crate::{classifier::words, error::RegistryLoadError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BUILTIN_PILLARS: &[(&str, &str)] = &[
    (
        "notation-system",
        include_str!("../data/pillars/notation-system.json"),
    ),
    (
        "instrument-production",
        include_str!("../data/pillars/instrument-production.json"),
    ),
    (
        "theory-curriculum",
        include_str!("../data/pillars/theory-curriculum.json"),
    ),
    (
        "performance-technique",
        include_str!("../data/pillars/performance-technique.json"),
    ),
];

/// Raw pillar data as stored in a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarData {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub terms: Vec<String>,
}

/// Where a pillar's data comes from.
#[derive(Debug, Clone)]
pub enum PillarSource {
    /// JSON compiled into the binary.
    Embedded {
        label: &'static str,
        json: &'static str,
    },
    /// A JSON file on disk.
    File(PathBuf),
    /// Data already in memory.
    Inline(PillarData),
}

impl PillarSource {
    /// The four pillars shipped with the crate.
    pub fn builtin() -> Vec<PillarSource> {
        BUILTIN_PILLARS
            .iter()
            .map(|&(label, json)| PillarSource::Embedded { label, json })
            .collect()
    }

    /// One source per `*.json` file in `dir`, ordered by file name.
    ///
    /// A missing or unreadable directory yields no sources.
    pub fn from_dir(dir: &Path) -> Vec<PillarSource> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Pillar directory unreadable; no pillar sources loaded");
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
            })
            .collect();
        paths.sort();
        paths.into_iter().map(PillarSource::File).collect()
    }

    /// Convenience constructor for in-memory pillars.
    pub fn inline<I, S>(name: &str, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PillarSource::Inline(PillarData {
            name: name.to_string(),
            description: None,
            terms: terms.into_iter().map(Into::into).collect(),
        })
    }

    /// Name used for the pillar when its data cannot be read.
    fn fallback_name(&self) -> String {
        match self {
            PillarSource::Embedded { label, .. } => label.to_string(),
            PillarSource::File(path) => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string(),
            PillarSource::Inline(data) => data.name.clone(),
        }
    }

    fn read(&self) -> Result<PillarData, RegistryLoadError> {
        match self {
            PillarSource::Embedded { label, json } => {
                serde_json::from_str(json).map_err(|source| RegistryLoadError::Malformed {
                    origin: format!("embedded:{label}"),
                    source,
                })
            }
            PillarSource::File(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|source| RegistryLoadError::Io {
                        path: path.clone(),
                        source,
                    })?;
                serde_json::from_str(&text).map_err(|source| RegistryLoadError::Malformed {
                    origin: path.display().to_string(),
                    source,
                })
            }
            PillarSource::Inline(data) => Ok(data.clone()),
        }
    }
}

/// A single recognized phrase bound to one pillar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PillarTerm {
    pub pillar: String,
    /// Normalized (lower-cased, single-spaced) phrase.
    pub phrase: String,
    pub(crate) words: Vec<String>,
}

impl PillarTerm {
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

/// A named knowledge domain with its vocabulary.
#[derive(Debug, Clone)]
pub struct Pillar {
    pub name: String,
    pub description: Option<String>,
    terms: Vec<PillarTerm>,
    load_error: Option<String>,
}

impl Pillar {
    fn available(data: PillarData) -> Result<Self, RegistryLoadError> {
        let mut seen = HashSet::new();
        let mut terms = Vec::with_capacity(data.terms.len());
        for raw in &data.terms {
            let words = words(raw);
            if words.is_empty() {
                continue;
            }
            let phrase = words.join(" ");
            if seen.insert(phrase.clone()) {
                terms.push(PillarTerm {
                    pillar: data.name.clone(),
                    phrase,
                    words,
                });
            }
        }

        if terms.is_empty() {
            return Err(RegistryLoadError::Empty(data.name));
        }

        if terms.len() < data.terms.len() {
            debug!(pillar = %data.name, raw = data.terms.len(), kept = terms.len(), "Dropped duplicate or empty pillar terms");
        }

        Ok(Self {
            name: data.name,
            description: data.description,
            terms,
            load_error: None,
        })
    }

    fn unavailable(name: String, error: &RegistryLoadError) -> Self {
        Self {
            name,
            description: None,
            terms: Vec::new(),
            load_error: Some(error.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.load_error.is_none()
    }

    pub fn terms(&self) -> &[PillarTerm] {
        &self.terms
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }
}

/// Status of one pillar, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PillarStatus {
    pub name: String,
    pub available: bool,
    pub term_count: usize,
    pub error: Option<String>,
}

/// The immutable set of pillars loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pillars: Vec<Pillar>,
}

impl Registry {
    /// Loads every source, degrading failed sources to unavailable pillars.
    pub fn load<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = PillarSource>,
    {
        let mut pillars: Vec<Pillar> = Vec::new();

        for source in sources {
            let loaded = source.read().and_then(|data| {
                let taken = pillars
                    .iter()
                    .any(|p| p.is_available() && p.name.eq_ignore_ascii_case(&data.name));
                if taken {
                    Err(RegistryLoadError::Duplicate(data.name))
                } else {
                    Pillar::available(data)
                }
            });

            match loaded {
                Ok(pillar) => {
                    info!(pillar = %pillar.name, terms = pillar.terms.len(), "Pillar loaded");
                    pillars.push(pillar);
                }
                Err(e) => {
                    let name = match &e {
                        RegistryLoadError::Empty(name) | RegistryLoadError::Duplicate(name) => {
                            name.clone()
                        }
                        _ => source.fallback_name(),
                    };
                    warn!(pillar = %name, error = %e, "Pillar unavailable");
                    pillars.push(Pillar::unavailable(name, &e));
                }
            }
        }

        Self { pillars }
    }

    /// The pillars shipped with the crate.
    pub fn builtin() -> Self {
        Self::load(PillarSource::builtin())
    }

    /// Every registered pillar in registration order, available or not.
    pub fn pillars(&self) -> &[Pillar] {
        &self.pillars
    }

    /// Pillars usable for classification, in registration order.
    pub fn available_pillars(&self) -> impl Iterator<Item = &Pillar> {
        self.pillars.iter().filter(|p| p.is_available())
    }

    /// Looks a pillar up by name, preferring a loaded pillar over a failed
    /// source of the same name.
    pub fn get(&self, name: &str) -> Option<&Pillar> {
        self.available_pillars()
            .find(|p| p.name == name)
            .or_else(|| self.pillars.iter().find(|p| p.name == name))
    }

    pub fn term_count(&self) -> usize {
        self.available_pillars().map(|p| p.terms.len()).sum()
    }

    pub fn statuses(&self) -> Vec<PillarStatus> {
        self.pillars
            .iter()
            .map(|p| PillarStatus {
                name: p.name.clone(),
                available: p.is_available(),
                term_count: p.terms.len(),
                error: p.load_error.clone(),
            })
            .collect()
    }

    /// A short phrase describing what the available pillars cover.
    pub fn capabilities(&self) -> String {
        let mut parts = vec!["general music fundamentals".to_string()];
        parts.extend(self.available_pillars().map(|p| {
            p.description
                .clone()
                .unwrap_or_else(|| p.name.replace('-', " "))
        }));
        parts.join(", ")
    }
}
