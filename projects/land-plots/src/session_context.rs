use crate::surface::types::Plot;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const METADATA_FILE: &str = "session.json";
const PLOTS_FILE: &str = "plots.json";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionMetadata {
    pub session_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub output_dir: PathBuf,
}

impl SessionMetadata {
    pub fn plots_path(&self) -> PathBuf {
        self.output_dir.join(PLOTS_FILE)
    }
}

/// Session ids become directory names, so only a safe subset is accepted.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn create_session(
    output_root: &Path,
    name: &str,
    width: u32,
    height: u32,
) -> Result<SessionMetadata> {
    let session_id = uuid::Uuid::new_v4().simple().to_string();
    let output_dir = output_root.join(&session_id);
    if output_dir.exists() {
        return Err(anyhow::anyhow!(
            "Output directory already exists for: {}",
            session_id
        ));
    }

    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create session directory {:?}", output_dir))?;

    let metadata = SessionMetadata {
        session_id,
        name: name.to_string(),
        created_at: Utc::now(),
        width,
        height,
        output_dir: output_dir.clone(),
    };

    let content = serde_json::to_string_pretty(&metadata)?;
    fs::write(output_dir.join(METADATA_FILE), content)?;
    save_plots(&metadata, &[])?;

    Ok(metadata)
}

fn read_metadata(dir: &Path) -> Result<Option<SessionMetadata>> {
    let metadata_path = dir.join(METADATA_FILE);
    if !metadata_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&metadata_path)?;
    let mut metadata: SessionMetadata = serde_json::from_str(&content)
        .with_context(|| format!("Invalid session metadata at {:?}", metadata_path))?;
    metadata.output_dir = dir.to_path_buf();
    Ok(Some(metadata))
}

pub fn load_session(output_root: &Path, session_id: &str) -> Result<Option<SessionMetadata>> {
    if !is_valid_session_id(session_id) {
        return Ok(None);
    }
    read_metadata(&output_root.join(session_id))
}

pub fn list_sessions(output_root: &Path) -> Result<Vec<SessionMetadata>> {
    let mut sessions = Vec::new();

    if !output_root.exists() {
        return Ok(sessions);
    }

    for entry in fs::read_dir(output_root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            match read_metadata(&path) {
                Ok(Some(metadata)) => sessions.push(metadata),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping session at {:?}: {}", path, e),
            }
        }
    }

    sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(sessions)
}

/// Reads committed plots. Entries that fail validation (e.g. fewer than
/// three vertices) are skipped.
pub fn load_plots(metadata: &SessionMetadata) -> Result<Vec<Plot>> {
    let path = metadata.plots_path();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path)?;
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(&content).with_context(|| format!("Invalid plots file {:?}", path))?;

    let mut plots = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Plot>(entry) {
            Ok(plot) => plots.push(plot),
            Err(e) => tracing::warn!(
                "Session {}: dropped invalid plot: {}",
                metadata.session_id,
                e
            ),
        }
    }
    Ok(plots)
}

pub fn save_plots(metadata: &SessionMetadata, plots: &[Plot]) -> Result<()> {
    let content = serde_json::to_string_pretty(plots)?;
    fs::write(metadata.plots_path(), content)
        .with_context(|| format!("Failed to write plots for session {}", metadata.session_id))?;
    Ok(())
}

pub fn append_plot(metadata: &SessionMetadata, plot: &Plot) -> Result<()> {
    let mut plots = load_plots(metadata)?;
    plots.push(plot.clone());
    save_plots(metadata, &plots)
}
