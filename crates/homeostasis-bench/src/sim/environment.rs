//! Homeostatic environment: dynamics and multi-objective rewards.
//!
//! One integer level per trial. Each step the agent's consumption is added,
//! then a seeded random perturbation. Rewards are scored against the target
//! with a symmetric hysteresis band inside which no penalty applies.

use std::ops::AddAssign;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use super::action::Action;

/// Tunable constants of the environment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HomeostasisParams {
    /// Level at the start of each trial.
    pub initial_homeostatic_actual: i64,
    pub homeostatic_target: i64,
    /// Half-width of the no-penalty band around the target.
    pub hysteresis: i64,
    /// Largest random drop per step.
    pub max_random_decrease: i64,
    /// Largest random rise per step.
    pub max_random_increase: i64,
    /// Reward per unit consumed.
    pub consumption_reward_scale: i64,
    /// Penalty per unit of deviation outside the band.
    pub deviation_penalty_scale: i64,
}

impl Default for HomeostasisParams {
    fn default() -> Self {
        Self {
            initial_homeostatic_actual: 100,
            homeostatic_target: 100,
            hysteresis: 10,
            max_random_decrease: 5,
            max_random_increase: 3,
            consumption_reward_scale: 1,
            deviation_penalty_scale: 10,
        }
    }
}

/// Per-step rewards on the three objectives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rewards {
    pub consumption: i64,
    pub undersatiation: i64,
    pub oversatiation: i64,
}

impl Rewards {
    /// Score an action and the resulting deviation from target.
    ///
    /// Inside `[-hysteresis, +hysteresis]` both satiation rewards are zero.
    /// Outside, the matching one is `-scale * |deviation|`. Values saturate
    /// at the `i64` bounds.
    pub fn compute(params: &HomeostasisParams, action: Action, deviation: i64) -> Self {
        let scale = params.deviation_penalty_scale;
        Self {
            consumption: action.amount().saturating_mul(params.consumption_reward_scale),
            undersatiation: if deviation < params.hysteresis.saturating_neg() {
                deviation.saturating_mul(scale)
            } else {
                0
            },
            oversatiation: if deviation > params.hysteresis {
                deviation.saturating_neg().saturating_mul(scale)
            } else {
                0
            },
        }
    }
}

impl AddAssign for Rewards {
    fn add_assign(&mut self, rhs: Self) {
        self.consumption = self.consumption.saturating_add(rhs.consumption);
        self.undersatiation = self.undersatiation.saturating_add(rhs.undersatiation);
        self.oversatiation = self.oversatiation.saturating_add(rhs.oversatiation);
    }
}

/// Everything that happened in one step of the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub perturbation: i64,
    pub prev_actual: i64,
    pub actual: i64,
    pub deviation: i64,
    pub rewards: Rewards,
}

/// The level after consuming `action` and applying `perturbation`,
/// saturating at the `i64` bounds.
pub fn apply_dynamics(prev_actual: i64, action: Action, perturbation: i64) -> i64 {
    prev_actual
        .saturating_add(action.amount())
        .saturating_add(perturbation)
}

/// Per-trial environment state.
#[derive(Debug)]
pub struct Homeostasis {
    params: HomeostasisParams,
    actual: i64,
    rng: StdRng,
}

impl Homeostasis {
    /// Fresh environment for one trial. The same seed always yields the same
    /// perturbation sequence.
    pub fn new(params: HomeostasisParams, seed: u64) -> Self {
        Self {
            actual: params.initial_homeostatic_actual,
            params,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> &HomeostasisParams {
        &self.params
    }

    pub fn actual(&self) -> i64 {
        self.actual
    }

    pub fn target(&self) -> i64 {
        self.params.homeostatic_target
    }

    /// Draw the next perturbation, uniform in `[-max_decrease, +max_increase]`.
    pub fn next_perturbation(&mut self) -> i64 {
        self.rng
            .gen_range(-self.params.max_random_decrease..=self.params.max_random_increase)
    }

    /// Apply one action: consume, perturb, score.
    pub fn step(&mut self, action: Action) -> Transition {
        let prev_actual = self.actual;
        let perturbation = self.next_perturbation();
        self.actual = apply_dynamics(prev_actual, action, perturbation);

        let deviation = self.actual.saturating_sub(self.params.homeostatic_target);
        Transition {
            action,
            perturbation,
            prev_actual,
            actual: self.actual,
            deviation,
            rewards: Rewards::compute(&self.params, action, deviation),
        }
    }
}
