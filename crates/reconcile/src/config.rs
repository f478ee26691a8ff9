//! Reconciler configuration, built once at startup and shared read-only.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::dashboard::Dashboard;
use crate::ReconcileError;

/// Model servers with a known metrics dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimeFlavor {
    Caikit,
    Ovms,
    Tgis,
    Vllm,
}

impl RuntimeFlavor {
    pub const ALL: [RuntimeFlavor; 4] = [RuntimeFlavor::Caikit, RuntimeFlavor::Ovms, RuntimeFlavor::Tgis, RuntimeFlavor::Vllm];

    /// Map the image name (last path segment without tag or digest) of a
    /// runtime's server container.
    pub fn from_image_name(name: &str) -> Option<Self> {
        match name {
            "caikit-nlp" | "caikit-tgis-serving" => Some(Self::Caikit),
            "openvino_model_server" => Some(Self::Ovms),
            "text-generation-inference" => Some(Self::Tgis),
            "vllm" => Some(Self::Vllm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Caikit => "caikit",
            Self::Ovms => "ovms",
            Self::Tgis => "tgis",
            Self::Vllm => "vllm",
        }
    }

    pub fn template_file(&self) -> String {
        format!("{}-metrics.json", self.as_str())
    }

    fn builtin(&self) -> &'static str {
        match self {
            Self::Caikit => include_str!("../templates/caikit-metrics.json"),
            Self::Ovms => include_str!("../templates/ovms-metrics.json"),
            Self::Tgis => include_str!("../templates/tgis-metrics.json"),
            Self::Vllm => include_str!("../templates/vllm-metrics.json"),
        }
    }
}

/// Dashboard query templates per runtime. Immutable once built.
#[derive(Debug, Clone)]
pub struct DashboardTemplates {
    templates: BTreeMap<RuntimeFlavor, String>,
}

impl DashboardTemplates {
    pub fn builtin() -> Self {
        let templates = RuntimeFlavor::ALL.iter().map(|f| (*f, f.builtin().to_string())).collect();
        Self { templates }
    }

    /// Built-in templates, overridden by any `<runtime>-metrics.json` found in
    /// `dir`. Overrides must parse as a dashboard (a `config` list of panels).
    pub fn from_dir(dir: &Path) -> Result<Self, ReconcileError> {
        let mut out = Self::builtin();
        for flavor in RuntimeFlavor::ALL {
            let path = dir.join(flavor.template_file());
            if !path.is_file() {
                continue;
            }
            let body = fs::read_to_string(&path)
                .map_err(|e| ReconcileError::Template(format!("reading {}: {}", path.display(), e)))?;
            serde_json::from_str::<Dashboard>(&body)
                .map_err(|e| ReconcileError::Template(format!("parsing {}: {}", path.display(), e)))?;
            info!(runtime = flavor.as_str(), path = %path.display(), "dashboard template override loaded");
            out.templates.insert(flavor, body);
        }
        Ok(out)
    }

    pub fn with_template(mut self, flavor: RuntimeFlavor, body: impl Into<String>) -> Self {
        self.templates.insert(flavor, body.into());
        self
    }

    pub fn get(&self, flavor: RuntimeFlavor) -> Option<&str> {
        self.templates.get(&flavor).map(String::as_str)
    }
}

impl Default for DashboardTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}

pub const DEFAULT_RATE_INTERVAL: &str = "1m";

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub templates: DashboardTemplates,
    /// Substituted for `${RATE_INTERVAL}` in dashboard queries.
    pub rate_interval: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { templates: DashboardTemplates::builtin(), rate_interval: DEFAULT_RATE_INTERVAL.to_string() }
    }
}
