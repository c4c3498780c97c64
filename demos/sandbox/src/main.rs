// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A scripted minute of gameplay against a simulated scene.
//!
//! The scene is a field of sprites under a drifting camera. Frame cost grows
//! with what is actually drawn, and a load spike in the middle of the run
//! forces the runtime to shed quality and later win it back.

use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tempo_sdk::prelude::*;

const WORLD_WIDTH: f32 = 4000.0;
const WORLD_HEIGHT: f32 = 3000.0;
const SPRITES: u64 = 600;
const FRAMES: usize = 3600;

struct SimObject {
    id: DrawableId,
    kind: &'static str,
    position: Option<Position>,
    visible: bool,
    scale: f32,
    text: String,
    destroyed: bool,
}

impl SimObject {
    fn new(id: u64, kind: &'static str, position: Option<Position>) -> Self {
        Self {
            id: DrawableId(id),
            kind,
            position,
            visible: true,
            scale: 1.0,
            text: String::new(),
            destroyed: false,
        }
    }

    fn alive(&self) -> HostResult<()> {
        if self.destroyed {
            Err(HostError::Destroyed(self.id))
        } else {
            Ok(())
        }
    }
}

impl Drawable for SimObject {
    fn id(&self) -> DrawableId {
        self.id
    }

    fn kind(&self) -> &str {
        self.kind
    }

    fn position(&self) -> Option<Position> {
        self.position
    }

    fn set_visible(&mut self, visible: bool) -> HostResult<()> {
        self.alive()?;
        self.visible = visible;
        Ok(())
    }

    fn set_scale(&mut self, scale: f32) -> HostResult<()> {
        self.alive()?;
        self.scale = scale;
        Ok(())
    }

    fn set_position(&mut self, x: f32, y: f32) -> HostResult<()> {
        self.alive()?;
        self.position = Some(Position::new(x, y));
        Ok(())
    }

    fn set_text(&mut self, text: &str) -> HostResult<()> {
        self.alive()?;
        self.text = text.to_string();
        Ok(())
    }

    fn destroy(&mut self) -> HostResult<()> {
        self.alive()?;
        self.destroyed = true;
        Ok(())
    }
}

#[derive(Default)]
struct SimScene {
    objects: Vec<Rc<RefCell<SimObject>>>,
    camera: CameraView,
    next_id: u64,
}

impl SimScene {
    fn spawn(&mut self, kind: &'static str, position: Option<Position>) -> SharedDrawable {
        self.next_id += 1;
        let object = Rc::new(RefCell::new(SimObject::new(self.next_id, kind, position)));
        self.objects.push(object.clone());
        object
    }

    /// Cost of drawing the live, visible objects, in milliseconds.
    fn draw_cost(&self) -> f64 {
        self.objects
            .iter()
            .map(|o| o.borrow())
            .filter(|o| !o.destroyed && o.visible)
            .map(|o| 0.06 * f64::from(o.scale * o.scale))
            .sum()
    }

    fn live(&self) -> usize {
        self.objects.iter().filter(|o| !o.borrow().destroyed).count()
    }
}

impl RenderHost for SimScene {
    fn add_text(
        &mut self,
        text: &str,
        _style: &TextStyle,
        x: f32,
        y: f32,
    ) -> HostResult<SharedDrawable> {
        let object = self.spawn("text", Some(Position::new(x, y)));
        object.borrow_mut().set_text(text)?;
        Ok(object)
    }

    fn add_sprite(&mut self, _texture: &str, x: f32, y: f32) -> HostResult<SharedDrawable> {
        Ok(self.spawn("sprite", Some(Position::new(x, y))))
    }

    fn add_rectangle(
        &mut self,
        x: f32,
        y: f32,
        _width: f32,
        _height: f32,
    ) -> HostResult<SharedDrawable> {
        Ok(self.spawn("rectangle", Some(Position::new(x, y))))
    }

    fn add_graphics(&mut self) -> HostResult<SharedDrawable> {
        Ok(self.spawn("graphics", None))
    }

    fn camera(&self) -> Option<CameraView> {
        Some(self.camera)
    }
}

/// Extra milliseconds of simulation work at `frame`.
fn scripted_load(frame: usize) -> f64 {
    match frame {
        900..=1800 => 30.0,
        _ => 2.0,
    }
}

/// Cheap deterministic scatter over the world.
fn scatter(i: u64) -> Position {
    let h = i.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let x = (h >> 16) % WORLD_WIDTH as u64;
    let y = (h >> 40) % WORLD_HEIGHT as u64;
    Position::new(x as f32, y as f32)
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let executor = tokio::runtime::Builder::new_current_thread().build()?;
    let clock = ManualClock::new();
    let mut scene = SimScene {
        camera: CameraView::new(0.0, 0.0, 1280.0, 720.0),
        ..Default::default()
    };

    let mut runtime = QualityRuntime::new(RuntimeConfig::default(), clock.shared());
    executor.block_on(runtime.initialize(&NullProbe, &mut scene));

    let sprites: Vec<SharedDrawable> = (0..SPRITES)
        .filter_map(|i| {
            let at = scatter(i);
            scene.add_sprite("asteroid", at.x, at.y).ok()
        })
        .collect();
    let hud_style = TextStyle::default();
    let mut last_tier = runtime.manager().current_tier();

    for frame in 0..FRAMES {
        runtime.begin_frame();

        let t = frame as f32 / 60.0;
        scene.camera.scroll_x = (t * 40.0) % (WORLD_WIDTH - scene.camera.width);
        scene.camera.scroll_y = (t * 15.0) % (WORLD_HEIGHT - scene.camera.height);
        {
            let mut optimizer = runtime.optimizer_mut();
            optimizer.set_camera(scene.camera);
            optimizer.cull_objects(&sprites, scene.camera);
            for sprite in &sprites {
                optimizer.apply_dynamic_lod(sprite);
            }
            optimizer.batch_render(&sprites, |_| Ok(()));

            let hud = [
                TextRequest::new("SCORE", hud_style.clone(), 16.0, 16.0),
                TextRequest::new(
                    format!("WAVE {}", frame / 600 + 1),
                    hud_style.clone(),
                    16.0,
                    40.0,
                ),
            ];
            optimizer.batch_render_texts(&mut scene, &hud);
        }

        let cost = 4.0 + scene.draw_cost() + scripted_load(frame);
        clock.advance_ms(cost);
        runtime.end_frame();

        let tier = runtime.manager().current_tier();
        if tier != last_tier {
            log::info!("sandbox: frame {frame} at {:.1}s runs {tier}", clock.now().as_secs_f64());
            last_tier = tier;
        }
    }

    let elapsed = clock.now();
    runtime.log_summary(elapsed);
    log::info!(
        "sandbox: {} live objects, summary:\n{}",
        scene.live(),
        runtime.analyzer().export_summary_json(Duration::from_secs(10))?
    );
    runtime.destroy();
    Ok(())
}
