use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StripError};

pub const DEFAULT_LOADER_NODE: &str = "273";
pub const DEFAULT_SAVE_NODE: &str = "275";
pub const DEFAULT_DIRECTORY_TIMEOUT: Duration = Duration::from_secs(3000);
pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(30000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_LABEL_FONT_SIZE: f32 = 20.0;
pub const DEFAULT_LABEL_BAND_HEIGHT: u32 = 50;

/// Everything a sweep needs, read once at startup.
///
/// Use [`StripConfig::from_env()`] in the binary. Tests build one with
/// [`StripConfig::from_lookup()`] or [`StripConfig::builder()`] so the
/// process environment is never touched.
#[derive(Debug, Clone)]
pub struct StripConfig {
    /// Directory holding the API-format workflow JSON.
    pub workflow_dir: PathBuf,

    /// File name of the workflow JSON inside `workflow_dir`.
    pub workflow_file: String,

    /// Directory scanned for `checkpoint-<N>.safetensors` files.
    pub finetune_dir: PathBuf,

    /// ComfyUI base URL (scheme added when configured as `host:port`).
    pub api_endpoint: String,

    /// Where the finished strip is written.
    pub image_output_dir: PathBuf,

    /// TTF/OTF font used for labels.
    pub font_path: PathBuf,

    /// ComfyUI's own output root; the run stamp is appended to it.
    pub comfyui_output_dir: PathBuf,

    /// Node id of the model loader in the workflow.
    pub loader_node: String,

    /// Node id of the image save node in the workflow.
    pub save_node: String,

    /// How long to wait for the run's output directory to appear.
    pub directory_timeout: Duration,

    /// How long to wait for all images once the directory exists.
    pub image_timeout: Duration,

    /// Sleep between filesystem checks.
    pub poll_interval: Duration,

    /// Label size in pixels.
    pub label_font_size: f32,

    /// Height of the white band holding the labels.
    pub label_band_height: u32,

    /// Fail compositing when a checkpoint has no usable image.
    pub strict: bool,
}

impl StripConfig {
    /// Load from the process environment. Call `dotenv` before this if a
    /// `.env` file should be honored.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required =
            |key: &str| get(key).ok_or_else(|| StripError::MissingConfig(key.to_string()));

        let config = StripConfig {
            workflow_dir: PathBuf::from(required("API_WORKFLOW_DIR")?),
            workflow_file: required("API_WORKFLOW_FILE")?,
            finetune_dir: PathBuf::from(required("FINETUNE_DIR")?),
            api_endpoint: normalize_endpoint(&required("API_ENDPOINT")?),
            image_output_dir: PathBuf::from(required("IMAGE_OUTPUT_DIR")?),
            font_path: PathBuf::from(required("FONT_TTF_PATH")?),
            comfyui_output_dir: PathBuf::from(required("COMFYUI_OUTPUT_DIR")?),
            loader_node: get("LOADER_NODE_ID").unwrap_or_else(|| DEFAULT_LOADER_NODE.to_string()),
            save_node: get("SAVE_NODE_ID").unwrap_or_else(|| DEFAULT_SAVE_NODE.to_string()),
            directory_timeout: seconds(&get, "DIRECTORY_TIMEOUT_SECS", DEFAULT_DIRECTORY_TIMEOUT)?,
            image_timeout: seconds(&get, "IMAGE_TIMEOUT_SECS", DEFAULT_IMAGE_TIMEOUT)?,
            poll_interval: seconds(&get, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?,
            label_font_size: parsed(&get, "LABEL_FONT_SIZE", DEFAULT_LABEL_FONT_SIZE)?,
            label_band_height: parsed(&get, "LABEL_BAND_HEIGHT", DEFAULT_LABEL_BAND_HEIGHT)?,
            strict: parsed(&get, "STRICT_STRIP", false)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Start building a config with the builder pattern.
    pub fn builder() -> StripConfigBuilder {
        StripConfigBuilder::default()
    }

    /// Full path of the workflow template file.
    pub fn workflow_path(&self) -> PathBuf {
        self.workflow_dir.join(&self.workflow_file)
    }

    /// Directory ComfyUI writes this run's images into.
    pub fn run_output_dir(&self, run_stamp: &str) -> PathBuf {
        self.comfyui_output_dir.join(run_stamp)
    }

    /// Destination of the finished strip.
    pub fn strip_path(&self, run_stamp: &str) -> PathBuf {
        self.image_output_dir
            .join(format!("output_image_strip_{}.png", run_stamp))
    }

    /// Reject intervals, timeouts and label sizes the run cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(StripError::InvalidConfig(
                "POLL_INTERVAL_SECS must be greater than zero".into(),
            ));
        }
        if self.image_timeout < self.directory_timeout {
            return Err(StripError::InvalidConfig(format!(
                "IMAGE_TIMEOUT_SECS ({}s) must not be shorter than DIRECTORY_TIMEOUT_SECS ({}s)",
                self.image_timeout.as_secs(),
                self.directory_timeout.as_secs()
            )));
        }
        if self.label_font_size.is_nan() || self.label_font_size <= 0.0 {
            return Err(StripError::InvalidConfig(
                "LABEL_FONT_SIZE must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn seconds<G>(get: &G, key: &str, default: Duration) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| StripError::InvalidConfig(format!("{} = {:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parsed<G, T>(get: &G, key: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| StripError::InvalidConfig(format!("{} = {:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

/// `127.0.0.1:8188` → `http://127.0.0.1:8188`; trailing slashes dropped.
pub fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Builder for [`StripConfig`]. Starts from the same defaults as the
/// environment loader with all paths empty.
pub struct StripConfigBuilder {
    config: StripConfig,
}

impl Default for StripConfigBuilder {
    fn default() -> Self {
        Self {
            config: StripConfig {
                workflow_dir: PathBuf::new(),
                workflow_file: String::new(),
                finetune_dir: PathBuf::new(),
                api_endpoint: normalize_endpoint("127.0.0.1:8188"),
                image_output_dir: PathBuf::new(),
                font_path: PathBuf::new(),
                comfyui_output_dir: PathBuf::new(),
                loader_node: DEFAULT_LOADER_NODE.to_string(),
                save_node: DEFAULT_SAVE_NODE.to_string(),
                directory_timeout: DEFAULT_DIRECTORY_TIMEOUT,
                image_timeout: DEFAULT_IMAGE_TIMEOUT,
                poll_interval: DEFAULT_POLL_INTERVAL,
                label_font_size: DEFAULT_LABEL_FONT_SIZE,
                label_band_height: DEFAULT_LABEL_BAND_HEIGHT,
                strict: false,
            },
        }
    }
}

impl StripConfigBuilder {
    /// Set the workflow template location.
    pub fn with_workflow(mut self, dir: impl AsRef<Path>, file: impl Into<String>) -> Self {
        self.config.workflow_dir = dir.as_ref().to_path_buf();
        self.config.workflow_file = file.into();
        self
    }

    /// Set the checkpoint directory.
    pub fn with_finetune_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.finetune_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the ComfyUI endpoint (`host:port` or full URL).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.api_endpoint = normalize_endpoint(endpoint);
        self
    }

    /// Set where the strip is written.
    pub fn with_image_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.image_output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the label font file.
    pub fn with_font(mut self, path: impl AsRef<Path>) -> Self {
        self.config.font_path = path.as_ref().to_path_buf();
        self
    }

    /// Set ComfyUI's output root.
    pub fn with_comfyui_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.comfyui_output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Override the loader and save node ids.
    pub fn with_nodes(mut self, loader: impl Into<String>, save: impl Into<String>) -> Self {
        self.config.loader_node = loader.into();
        self.config.save_node = save.into();
        self
    }

    /// Set both polling timeouts.
    pub fn with_timeouts(mut self, directory: Duration, images: Duration) -> Self {
        self.config.directory_timeout = directory;
        self.config.image_timeout = images;
        self
    }

    /// Set the sleep between filesystem checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set label font size and band height.
    pub fn with_label(mut self, font_size: f32, band_height: u32) -> Self {
        self.config.label_font_size = font_size;
        self.config.label_band_height = band_height;
        self
    }

    /// Fail compositing when a checkpoint has no usable image.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    /// Build the final [`StripConfig`].
    pub fn build(self) -> StripConfig {
        self.config
    }
}
