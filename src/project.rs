//! Project file model
//!
//! A [`Project`] owns the choice catalog and a list of CAD sources. Each
//! [`CadSource`] carries one [`PartInfo`] per part found in the geometry file,
//! and each part carries its baseline, its effects and per-task settings.
//!
//! Source paths are stored relative to the directory holding the project file
//! and made absolute again on load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::answers::RawAnswerMap;
use crate::catalog::Catalog;
use crate::choices::{Choice, ChoiceSpecError, ChoiceValue};
use crate::effects::Effect;
use crate::error::{Result, StepcvtError};
use crate::expr::Expression;
use crate::logic::resolver::{resolve_parts, PartDefaults, PartRecord, PartState, ResolutionReport};

// ============================================================================
// Task settings
// ============================================================================

/// Per-task settings attached to a part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskInfo {
    /// STEP to STL tessellation parameters
    #[serde(rename = "STLConversionInfo")]
    StlConversion {
        /// Rotation about x, y, z in degrees
        #[serde(default)]
        rotation: Vec<f64>,
        #[serde(rename = "linearTolerance")]
        linear_tolerance: f64,
        #[serde(rename = "angularTolerance")]
        angular_tolerance: f64,
    },

    /// Free-form slicer profile overrides
    #[serde(rename = "SlicerSettingsInfo")]
    SlicerSettings {
        slicer: String,
        #[serde(default)]
        settings: serde_json::Map<String, serde_json::Value>,
    },

    /// Note shown alongside the part
    #[serde(rename = "TextInfo")]
    Text { text: String },
}

// ============================================================================
// Parts
// ============================================================================

fn default_selected() -> bool {
    PartDefaults::default().selected
}

fn default_count() -> i64 {
    PartDefaults::default().count
}

fn default_scale() -> f64 {
    PartDefaults::default().scale
}

/// One part of a CAD source and everything the project knows about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct PartInfo {
    pub part_id: String,

    /// Baseline the resolver starts from; never written by resolution
    #[serde(default)]
    pub defaults: PartDefaults,

    #[serde(default = "default_selected")]
    pub selected: bool,

    #[serde(default = "default_count")]
    pub count: i64,

    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default)]
    pub effects: Vec<Effect>,

    #[serde(default)]
    pub info: Vec<TaskInfo>,
}

impl PartInfo {
    /// A part with the given baseline, its derived attributes equal to it
    pub fn new(part_id: impl Into<String>, defaults: PartDefaults) -> Self {
        Self {
            part_id: part_id.into(),
            defaults,
            selected: defaults.selected,
            count: defaults.count,
            scale: defaults.scale,
            effects: Vec::new(),
            info: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_info(mut self, info: TaskInfo) -> Self {
        self.info.push(info);
        self
    }

    /// Currently committed derived attributes
    pub fn state(&self) -> PartState {
        PartState {
            selected: self.selected,
            count: self.count,
            scale: self.scale,
        }
    }
}

impl PartRecord for PartInfo {
    fn part_id(&self) -> &str {
        &self.part_id
    }

    fn defaults(&self) -> PartDefaults {
        self.defaults
    }

    fn effects(&self) -> &[Effect] {
        &self.effects
    }

    fn commit(&mut self, state: PartState) {
        self.selected = state.selected;
        self.count = state.count;
        self.scale = state.scale;
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Enumerates the part identifiers contained in a geometry file
pub trait GeometrySource {
    fn part_ids(&self) -> Result<Vec<String>>;
}

impl<S: AsRef<str>> GeometrySource for [S] {
    fn part_ids(&self) -> Result<Vec<String>> {
        Ok(self.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

/// Part identifiers listed in a text file, one per line.
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct PartList {
    path: PathBuf,
}

impl PartList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GeometrySource for PartList {
    fn part_ids(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect())
    }
}

/// A CAD file and the parts the project tracks from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "CADSource")]
pub struct CadSource {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub partinfo: Vec<PartInfo>,
}

impl CadSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            partinfo: Vec::new(),
        }
    }

    pub fn with_part(mut self, part: PartInfo) -> Self {
        self.partinfo.push(part);
        self
    }

    pub fn part(&self, part_id: &str) -> Option<&PartInfo> {
        self.partinfo.iter().find(|p| p.part_id == part_id)
    }

    pub fn part_mut(&mut self, part_id: &str) -> Option<&mut PartInfo> {
        self.partinfo.iter_mut().find(|p| p.part_id == part_id)
    }

    /// Add a default part for every id the geometry reports that is not yet
    /// tracked. Existing parts are left as they are. Returns the number added.
    pub fn sync_parts<G: GeometrySource + ?Sized>(&mut self, geometry: &G) -> Result<usize> {
        let mut added = 0;
        for part_id in geometry.part_ids()? {
            if self.part(&part_id).is_none() {
                debug!(source = %self.name, part = %part_id, "tracking new part");
                self.partinfo.push(PartInfo::new(part_id, PartDefaults::default()));
                added += 1;
            }
        }
        Ok(added)
    }

    /// Stop tracking the given parts. Returns the number removed.
    pub fn remove_parts<S: AsRef<str>>(&mut self, part_ids: &[S]) -> usize {
        let before = self.partinfo.len();
        self.partinfo
            .retain(|p| !part_ids.iter().any(|id| id.as_ref() == p.part_id));
        let removed = before - self.partinfo.len();
        debug!(source = %self.name, removed, "parts removed");
        removed
    }

    /// Change the baseline count of a part; derived attributes follow on the
    /// next resolution
    pub fn set_default_count(&mut self, part_id: &str, count: i64) -> Result<()> {
        let name = self.name.clone();
        let part = self
            .part_mut(part_id)
            .ok_or_else(|| StepcvtError::unknown_part(name, part_id))?;
        part.defaults.count = count;
        Ok(())
    }

    /// Path as stored in a project file rooted at `root`.
    ///
    /// A relative path is already relative to the project directory and is
    /// kept as is; `root` must be absolute for the prefix check to hold.
    pub fn relative_path(&self, root: &Path) -> Result<PathBuf> {
        if self.path.is_relative() {
            return Ok(self.path.clone());
        }
        self.path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .map_err(|_| StepcvtError::path_outside_root(&self.path, root))
    }

    /// Path of the CAD file for a project file rooted at `root`
    pub fn absolute_path(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }
}

// ============================================================================
// Project
// ============================================================================

/// Top-level project file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Project")]
pub struct Project {
    pub name: String,

    #[serde(default)]
    pub available_choices: Catalog,

    #[serde(default)]
    pub sources: Vec<CadSource>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.available_choices = catalog;
        self
    }

    pub fn with_source(mut self, source: CadSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source(&self, name: &str) -> Option<&CadSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn source_mut(&mut self, name: &str) -> Option<&mut CadSource> {
        self.sources.iter_mut().find(|s| s.name == name)
    }

    /// Add a source; names must be unique within the project
    pub fn add_source(&mut self, source: CadSource) -> Result<()> {
        if self.source(&source.name).is_some() {
            return Err(StepcvtError::DuplicateSource { name: source.name });
        }
        info!(source = %source.name, path = ?source.path, "source added");
        self.sources.push(source);
        Ok(())
    }

    /// The named source, or the first one when no name is given
    pub fn source_for_parts_mut(&mut self, name: Option<&str>) -> Result<&mut CadSource> {
        match name {
            Some(name) => self
                .source_mut(name)
                .ok_or_else(|| StepcvtError::unknown_source(name)),
            None => self.sources.first_mut().ok_or(StepcvtError::NoSources),
        }
    }

    /// Run `edit` on a copy of the declared choices and rebuild the catalog
    /// from the result. On any error the catalog is left as it was.
    pub fn edit_catalog<T, F>(&mut self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Choice>) -> Result<T>,
    {
        let mut choices = self.available_choices.choices().to_vec();
        let out = edit(&mut choices)?;
        self.available_choices = Catalog::new(choices)?;
        Ok(out)
    }

    pub fn add_choice(&mut self, choice: Choice) -> Result<()> {
        let varname = choice.varname().to_string();
        self.edit_catalog(|choices| {
            choices.push(choice);
            Ok(())
        })?;
        info!(choice = %varname, "choice added");
        Ok(())
    }

    /// Remove a choice. Fails while another choice's preconditions still
    /// reference it.
    pub fn remove_choice(&mut self, varname: &str) -> Result<Choice> {
        let removed = self.edit_catalog(|choices| {
            let pos = choices
                .iter()
                .position(|c| c.varname() == varname)
                .ok_or_else(|| StepcvtError::unknown_choice(varname))?;
            Ok(choices.remove(pos))
        })?;
        info!(choice = %varname, "choice removed");
        Ok(removed)
    }

    pub fn remove_choice_value(&mut self, varname: &str, value_id: &str) -> Result<ChoiceValue> {
        self.edit_catalog(|choices| {
            let choice = find_choice(choices, varname)?;
            Ok(choice.remove_value(value_id)?)
        })
    }

    /// Replace or clear the precondition of one value
    pub fn set_precondition(
        &mut self,
        varname: &str,
        value_id: &str,
        precondition: Option<&str>,
    ) -> Result<()> {
        let precondition = precondition.map(Expression::parse).transpose()?;
        self.edit_catalog(|choices| {
            let choice = find_choice(choices, varname)?;
            let value = choice
                .find_value_mut(value_id)
                .ok_or_else(|| ChoiceSpecError::UnknownValue {
                    varname: varname.to_string(),
                    value_id: value_id.to_string(),
                })?;
            value.precondition = precondition;
            Ok(())
        })
    }

    /// Every part of every source, paired with its source name
    pub fn parts(&self) -> impl Iterator<Item = (&str, &PartInfo)> {
        self.sources
            .iter()
            .flat_map(|s| s.partinfo.iter().map(move |p| (s.name.as_str(), p)))
    }

    /// Validate `raw` against the catalog, then resolve every part.
    ///
    /// Invalid answers leave every part untouched. Parts whose effects fail to
    /// evaluate keep their previous attributes and are listed in the report.
    pub fn apply_choices(&mut self, raw: &RawAnswerMap) -> Result<ResolutionReport> {
        let answers = self.available_choices.validate(raw)?;

        let mut report = ResolutionReport::default();
        for source in &mut self.sources {
            report.extend(resolve_parts(&mut source.partinfo, &answers));
        }

        info!(
            project = %self.name,
            answers = answers.len(),
            committed = report.committed(),
            failed = report.outcomes.len() - report.committed(),
            "choices applied"
        );
        Ok(report)
    }

    /// Save the project as pretty JSON, storing source paths relative to the
    /// file's directory
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let root = project_root(path.as_ref())?;
        let mut stored = self.clone();
        for source in &mut stored.sources {
            source.path = source
                .relative_path(&root)
                .with_context(|| format!("Failed to store source '{}'", source.name))?;
        }

        let json =
            serde_json::to_string_pretty(&stored).context("Failed to serialize project to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write project to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load a project, making source paths absolute against the file's
    /// directory
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read project from {:?}", path.as_ref()))?;

        let mut project: Self =
            serde_json::from_str(&content).context("Failed to parse project JSON")?;

        let root = project_root(path.as_ref())?;
        for source in &mut project.sources {
            source.path = source.absolute_path(&root);
        }

        debug!(
            project = %project.name,
            choices = project.available_choices.len(),
            sources = project.sources.len(),
            "project loaded"
        );
        Ok(project)
    }
}

fn find_choice<'a>(choices: &'a mut [Choice], varname: &str) -> Result<&'a mut Choice> {
    choices
        .iter_mut()
        .find(|c| c.varname() == varname)
        .ok_or_else(|| StepcvtError::unknown_choice(varname))
}

/// Absolute directory that stored source paths are anchored to
pub fn project_root(file: &Path) -> Result<PathBuf> {
    let dir = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok(std::path::absolute(dir)?)
}

// ============================================================================
// Tests
// ============================================================================
