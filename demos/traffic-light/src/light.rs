//! Traffic light with three lamps and interchangeable animations
//!
//! Each animation is one coroutine. Starting another animation cancels the
//! running one; a guard inside every body switches its lamps off when the
//! body is dropped, so a cancelled animation never leaves a lamp lit.

use std::fmt;
use std::sync::Arc;

use callgate_core::{all_of, CoroutineResult};
use callgate_runtime::{
    invoke_with, Co, CoroutineHandle, CoroutineState, DriverConfig, NestedCoroutine,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::timer::Timer;

const COLORS: [&str; 5] = ["red", "green", "amber", "blue", "white"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lamp {
    Left,
    Center,
    Right,
}

impl Lamp {
    pub const ALL: [Lamp; 3] = [Lamp::Left, Lamp::Center, Lamp::Right];

    fn index(self) -> usize {
        match self {
            Lamp::Left => 0,
            Lamp::Center => 1,
            Lamp::Right => 2,
        }
    }
}

/// Lamp colors, shared with the running animation
#[derive(Clone, Default)]
pub struct Panel {
    lamps: Arc<Mutex<[Option<&'static str>; 3]>>,
}

impl Panel {
    pub fn set(&self, lamp: Lamp, color: Option<&'static str>) {
        let rendered = {
            let mut lamps = self.lamps.lock();
            lamps[lamp.index()] = color;
            render(&lamps)
        };
        info!(lamps = %rendered, "panel");
    }

    pub fn all_off(&self) {
        for lamp in Lamp::ALL {
            self.set(lamp, None);
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.lamps.lock()))
    }
}

fn render(lamps: &[Option<&'static str>; 3]) -> String {
    lamps
        .iter()
        .map(|lamp| format!("[{:^7}]", lamp.unwrap_or("")))
        .collect()
}

/// Switches lamps off when dropped
struct LampsOff {
    panel: Panel,
    lamps: Vec<Lamp>,
}

impl Drop for LampsOff {
    fn drop(&mut self) {
        for lamp in &self.lamps {
            self.panel.set(*lamp, None);
        }
    }
}

pub struct TrafficLight {
    panel: Panel,
    timer: Timer,
    anim: Option<CoroutineHandle>,
}

impl TrafficLight {
    pub fn new(timer: Timer) -> Self {
        TrafficLight {
            panel: Panel::default(),
            timer,
            anim: None,
        }
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn anim_state(&self) -> Option<CoroutineState> {
        self.anim.as_ref().map(CoroutineHandle::state)
    }

    /// Cancel the running animation, if any
    pub fn stop_anim(&mut self) {
        if let Some(anim) = self.anim.take() {
            anim.cancel();
        }
    }

    fn reset(&mut self) {
        self.stop_anim();
        self.panel.all_off();
    }

    /// Right, then left, then center, forever
    pub fn anim_normal(&mut self) -> CoroutineResult<()> {
        self.reset();
        let (panel, timer) = (self.panel.clone(), self.timer.clone());
        let handle = invoke_with(DriverConfig::named("normal"), move |co| async move {
            let _off = LampsOff {
                panel: panel.clone(),
                lamps: Lamp::ALL.to_vec(),
            };
            co.wait(timer.sleep(0.0)).await?;
            loop {
                for (lamp, color, hold) in [
                    (Lamp::Right, "red", 2.0),
                    (Lamp::Left, "green", 2.0),
                    (Lamp::Center, "amber", 1.0),
                ] {
                    panel.set(lamp, Some(color));
                    co.wait(timer.sleep(hold)).await?;
                    panel.set(lamp, None);
                    co.wait(timer.sleep(0.3)).await?;
                }
            }
        })?;
        self.anim = Some(handle);
        Ok(())
    }

    /// Center lamp blinks
    pub fn anim_blink_center(&mut self) -> CoroutineResult<()> {
        self.reset();
        let (panel, timer) = (self.panel.clone(), self.timer.clone());
        let handle = invoke_with(DriverConfig::named("blink"), move |co| async move {
            let _off = LampsOff {
                panel: panel.clone(),
                lamps: vec![Lamp::Center],
            };
            loop {
                panel.set(Lamp::Center, Some("amber"));
                co.wait(timer.sleep(0.7)).await?;
                panel.set(Lamp::Center, None);
                co.wait(timer.sleep(0.7)).await?;
            }
        })?;
        self.anim = Some(handle);
        Ok(())
    }

    /// Every lamp runs its own random animation; the three run side by side
    /// as nested coroutines and are cancelled together
    pub fn anim_random(&mut self, seed: u64) -> CoroutineResult<()> {
        self.reset();
        let lanes: Vec<_> = Lamp::ALL
            .into_iter()
            .map(|lamp| {
                NestedCoroutine::from_fn(
                    random_lamp,
                    (
                        self.panel.clone(),
                        self.timer.clone(),
                        lamp,
                        seed.wrapping_add(lamp.index() as u64),
                    ),
                )
            })
            .collect();

        let handle = invoke_with(DriverConfig::named("random"), move |co| async move {
            co.wait(all_of(lanes)).await?;
            Ok(())
        })?;
        self.anim = Some(handle);
        Ok(())
    }
}

async fn random_lamp(
    co: Co,
    (panel, timer, lamp, seed): (Panel, Timer, Lamp, u64),
) -> CoroutineResult<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let _off = LampsOff {
        panel: panel.clone(),
        lamps: vec![lamp],
    };
    loop {
        co.wait(timer.sleep(rng.gen::<f64>() + 0.5)).await?;
        panel.set(lamp, Some(COLORS[rng.gen_range(0..COLORS.len())]));
        co.wait(timer.sleep(rng.gen::<f64>() + 0.5)).await?;
        panel.set(lamp, None);
    }
}

impl Drop for TrafficLight {
    fn drop(&mut self) {
        self.stop_anim();
    }
}
