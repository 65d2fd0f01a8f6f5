use crate::game::Intent;
use crate::input::{Key, KeySnapshot};
use glam::DVec2;
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Deserialize)]
struct ScriptedInputFile {
    steps: Vec<ScriptedStep>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScriptedStep {
    ticks: u64,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    mine: bool,
    #[serde(default)]
    place: bool,
    #[serde(default)]
    cursor: Option<[f64; 2]>,
    #[serde(default)]
    scroll: i32,
}

/// Replays a JSON list of timed input steps, one tick at a time.
pub struct ScriptedInputPlayer {
    steps: Vec<(KeySnapshot, Intent, u64)>,
    index: usize,
    ticks_in_step: u64,
}

impl ScriptedInputPlayer {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> anyhow::Result<Self> {
        let file: ScriptedInputFile = serde_json::from_str(contents)?;
        if file.steps.is_empty() {
            anyhow::bail!("scripted input file contains no steps");
        }
        let view_center = DVec2::new(640.0, 360.0);
        let steps = file
            .steps
            .into_iter()
            .map(|step| {
                let mut keys = KeySnapshot::new();
                for name in &step.keys {
                    let key = Key::from_name(name)
                        .ok_or_else(|| anyhow::anyhow!("unknown key `{name}` in input script"))?;
                    keys = keys.with(key);
                }
                let intent = Intent {
                    cursor: step.cursor.map_or(view_center, DVec2::from_array),
                    mining: step.mine,
                    place: step.place,
                    scroll: step.scroll,
                };
                Ok((keys, intent, step.ticks))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            steps,
            index: 0,
            ticks_in_step: 0,
        })
    }

    /// True once no step has ticks left to play.
    pub fn finished(&self) -> bool {
        let mut remaining = self.steps.iter().skip(self.index).map(|(_, _, ticks)| *ticks);
        match remaining.next() {
            None => true,
            Some(ticks) => self.ticks_in_step >= ticks && remaining.all(|ticks| ticks == 0),
        }
    }

    /// Input for the next tick; `None` once every step has run.
    pub fn advance(&mut self) -> Option<(KeySnapshot, Intent)> {
        while let Some((_, _, ticks)) = self.steps.get(self.index) {
            if self.ticks_in_step < *ticks {
                break;
            }
            self.index += 1;
            self.ticks_in_step = 0;
        }
        let (keys, intent, _) = self.steps.get(self.index)?;
        self.ticks_in_step += 1;
        Some((keys.clone(), *intent))
    }
}
