use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cartograph_engine::device::{Gpu, GpuInit};
use cartograph_engine::layer::{ImageSource, Layer, LayerId, TileSource};
use cartograph_engine::logging::{init_logging, LoggingConfig};
use cartograph_engine::map::{MapOptions, MapRenderer};
use cartograph_engine::window::{AppControl, MapApp, Runtime, RuntimeConfig};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Opens every image given on the command line as a tile layer, bottom first.
/// Without arguments two generated checkerboards are shown.
///
/// Keys: `V` toggles the top layer, `L` simulates a context loss, `Esc` quits.
struct Studio {
    paths: Vec<PathBuf>,
    layers: Vec<LayerId>,
}

impl MapApp for Studio {
    fn setup(&mut self, map: &mut MapRenderer<Gpu>) -> Result<()> {
        let images = if self.paths.is_empty() {
            vec![
                checkerboard("checker:base", 512, 64, [40, 70, 120], [220, 220, 210])?,
                checkerboard("checker:overlay", 512, 24, [200, 90, 30], [20, 20, 20])?,
            ]
        } else {
            self.paths
                .iter()
                .map(|p| load_image(p))
                .collect::<Result<Vec<_>>>()?
        };

        for (i, image) in images.into_iter().enumerate() {
            let opacity = if i == 0 { 1.0 } else { 0.5 };
            let layer = Layer::tile(TileSource::with_image(image)).with_opacity(opacity);
            self.layers.push(map.add_layer(layer)?);
        }

        log::info!("{} layers registered", self.layers.len());
        Ok(())
    }

    fn on_window_event(&mut self, map: &mut MapRenderer<Gpu>, event: &WindowEvent) -> AppControl {
        let WindowEvent::KeyboardInput { event: key, .. } = event else {
            return AppControl::Continue;
        };
        if key.state != ElementState::Pressed || key.repeat {
            return AppControl::Continue;
        }

        match key.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => return AppControl::Exit,
            PhysicalKey::Code(KeyCode::KeyV) => {
                if let Some(&top) = self.layers.last() {
                    let visible = map.layer(top).is_some_and(|l| l.visible());
                    map.set_layer_visible(top, !visible);
                }
            }
            PhysicalKey::Code(KeyCode::KeyL) => map.device().lose_context(),
            _ => {}
        }

        AppControl::Continue
    }
}

fn load_image(path: &Path) -> Result<ImageSource> {
    let rgba = image::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    let image = ImageSource::from_rgba8(path.display().to_string(), width, height, rgba.into_raw())?;
    Ok(image)
}

fn checkerboard(locator: &str, size: u32, cell: u32, a: [u8; 3], b: [u8; 3]) -> Result<ImageSource> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let [r, g, bl] = if (x / cell + y / cell) % 2 == 0 { a } else { b };
            pixels.extend_from_slice(&[r, g, bl, 255]);
        }
    }
    Ok(ImageSource::from_rgba8(locator, size, size, pixels)?)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let studio = Studio {
        paths: std::env::args_os().skip(1).map(PathBuf::from).collect(),
        layers: Vec::new(),
    };

    let config = RuntimeConfig {
        title: "Cartograph Studio".to_string(),
        ..RuntimeConfig::default()
    };

    Runtime::run(config, GpuInit::default(), MapOptions::default(), studio)
}
