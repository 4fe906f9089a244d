use crate::particles::SceneConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    MobileLow,
    DesktopHigh,
    DesktopUltra,
}

#[derive(Debug, Clone, Copy)]
pub struct BudgetProfile {
    pub particle_count: u32,
    /// Whether the CPU reference step should fan out over rayon.
    pub parallel_step: bool,
    pub turbulence_scale: f32,
}

impl QualityTier {
    pub fn budget(self) -> BudgetProfile {
        match self {
            Self::MobileLow => BudgetProfile {
                particle_count: 1_000,
                parallel_step: false,
                turbulence_scale: 0.6,
            },
            Self::DesktopHigh => BudgetProfile {
                particle_count: 8_000,
                parallel_step: true,
                turbulence_scale: 1.0,
            },
            Self::DesktopUltra => BudgetProfile {
                particle_count: 20_000,
                parallel_step: true,
                turbulence_scale: 1.0,
            },
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "low" | "mobile" => Some(Self::MobileLow),
            "high" | "desktop" => Some(Self::DesktopHigh),
            "ultra" => Some(Self::DesktopUltra),
            _ => None,
        }
    }

    /// Applies this tier's budget on top of `scene`.
    pub fn apply(self, scene: SceneConfig) -> SceneConfig {
        let budget = self.budget();
        SceneConfig {
            particle_count: budget.particle_count,
            turbulence: scene.turbulence * budget.turbulence_scale,
            ..scene
        }
    }
}
