// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clap::Parser;
use lantern_platform::WindowOptions;
use lantern_render_vk::{DeviceOptions, PresentPreference};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file; missing means built-in defaults
    #[arg(long, default_value = "lantern.toml")]
    pub config: PathBuf,
    /// Window width, overrides [window] width
    #[arg(long)]
    pub width: Option<u32>,
    /// Window height, overrides [window] height
    #[arg(long)]
    pub height: Option<u32>,
    /// Enable the Vulkan validation layer
    #[arg(long)]
    pub validation: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VsyncMode {
    Fifo,
    #[default]
    Mailbox,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            title: "lantern".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub vsync: bool,
    pub vsync_mode: VsyncMode,
    /// rgb + intensity
    pub ambient: [f32; 4],
    pub validation: bool,
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            clear_color: [0.01, 0.01, 0.01, 1.0],
            vsync: true,
            vsync_mode: VsyncMode::Mailbox,
            ambient: [1.0, 1.0, 1.0, 0.02],
            validation: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneCfg {
    pub light_count: u32,
    pub orbit_radius: f32,
    /// radians per second
    pub light_speed: f32,
    pub light_intensity: f32,
    pub light_radius: f32,
}

impl Default for SceneCfg {
    fn default() -> Self {
        Self {
            light_count: 6,
            orbit_radius: 1.4,
            light_speed: 1.0,
            light_intensity: 0.2,
            light_radius: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraCfg {
    pub move_speed: f32,
    pub look_speed: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            look_speed: 1.5,
            fov_degrees: 50.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub scene: SceneCfg,
    pub camera: CameraCfg,
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// CLI flags win over the file.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        self.render.validation |= args.validation;
    }

    pub fn window_options(&self) -> WindowOptions {
        WindowOptions {
            title: self.window.title.clone(),
            width: self.window.width.max(1),
            height: self.window.height.max(1),
        }
    }

    pub fn device_options(&self) -> DeviceOptions {
        let mode = match self.render.vsync_mode {
            VsyncMode::Fifo => lantern_render_vk::VsyncMode::Fifo,
            VsyncMode::Mailbox => lantern_render_vk::VsyncMode::Mailbox,
        };
        DeviceOptions {
            app_name: self.window.title.clone(),
            validation: self.render.validation,
            present: PresentPreference {
                vsync: self.render.vsync,
                mode,
            },
        }
    }
}

/// Reads `path`. A missing file means defaults; an unreadable or malformed
/// one is reported and also falls back to defaults.
pub fn load(path: &Path) -> AppCfg {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            return AppCfg::default();
        }
        Err(e) => {
            warn!("could not read {}: {e}; using defaults", path.display());
            return AppCfg::default();
        }
    };
    AppCfg::parse(&text).unwrap_or_else(|e| {
        warn!("invalid config {}: {e}; using defaults", path.display());
        AppCfg::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(AppCfg::parse("").unwrap(), AppCfg::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppCfg::parse(
            r#"
            [render]
            vsync = false
            vsync_mode = "fifo"

            [scene]
            light_count = 12
            "#,
        )
        .unwrap();
        assert!(!cfg.render.vsync);
        assert_eq!(cfg.render.vsync_mode, VsyncMode::Fifo);
        assert_eq!(cfg.render.clear_color, RenderCfg::default().clear_color);
        assert_eq!(cfg.scene.light_count, 12);
        assert_eq!(cfg.scene.light_speed, SceneCfg::default().light_speed);
        assert_eq!(cfg.camera, CameraCfg::default());
    }

    #[test]
    fn unknown_vsync_mode_is_rejected() {
        assert!(AppCfg::parse("[render]\nvsync_mode = \"sometimes\"\n").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load(Path::new("definitely/not/here/lantern.toml"));
        assert_eq!(cfg, AppCfg::default());
    }

    #[test]
    fn cli_overrides_window_size_and_validation() {
        let args = Args::parse_from(["lantern", "--width", "1280", "--validation"]);
        let mut cfg = AppCfg::default();
        cfg.apply_args(&args);
        assert_eq!(cfg.window.width, 1280);
        assert_eq!(cfg.window.height, 600);
        assert!(cfg.device_options().validation);
        assert_eq!(args.config, PathBuf::from("lantern.toml"));
    }
}
