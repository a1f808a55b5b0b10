//! Player movement: input intent to pose, one tick at a time

use glam::{Vec2, Vec3};
use std::f32::consts::{FRAC_PI_2, TAU};

use crate::util::time::clamp_delta;

use super::player::Pose;

/// Movement tuning
#[derive(Debug, Clone, Copy)]
pub struct MovementConfig {
    /// Walking speed (units/s)
    pub base_speed: f32,
    /// Sprinting speed (units/s)
    pub sprint_speed: f32,
    /// Speed multiplier while aiming down sights
    pub aim_factor: f32,
    /// Horizontal velocity approach rate (1/s)
    pub acceleration: f32,
    /// Per-frame (at 60 Hz) horizontal retention with no input, on the ground
    pub ground_friction: f32,
    /// Per-frame (at 60 Hz) horizontal retention with no input, in the air
    pub air_friction: f32,
    /// Vertical acceleration (units/s², negative is down)
    pub gravity: f32,
    /// Launch speed of a jump (units/s)
    pub jump_speed: f32,
    /// Height of the ground plane
    pub ground_y: f32,
    /// Eye height above the ground plane
    pub eye_height: f32,
    /// Radians of rotation per unit of pointer movement
    pub look_sensitivity: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            base_speed: 5.0,
            sprint_speed: 8.0,
            aim_factor: 0.6,
            acceleration: 10.0,
            ground_friction: 0.8,
            air_friction: 0.95,
            gravity: -25.0,
            jump_speed: 8.0,
            ground_y: 0.0,
            eye_height: 1.8,
            look_sensitivity: 0.002,
        }
    }
}

impl MovementConfig {
    /// Height at which the eye rests on the ground
    pub fn rest_height(&self) -> f32 {
        self.ground_y + self.eye_height
    }
}

/// Per-player kinematic state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementState {
    pub velocity: Vec3,
    pub grounded: bool,
}

impl Default for MovementState {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            grounded: true,
        }
    }
}

/// Input flags sampled for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementIntent {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub aiming: bool,
    pub jump: bool,
}

impl MovementIntent {
    pub fn any_movement(&self) -> bool {
        self.forward || self.back || self.left || self.right
    }

    /// Unit direction in view space (-z forward, +x right). Zero with no input.
    pub fn direction(&self) -> Vec3 {
        let x = f32::from(u8::from(self.right)) - f32::from(u8::from(self.left));
        let z = f32::from(u8::from(self.back)) - f32::from(u8::from(self.forward));
        Vec3::new(x, 0.0, z).normalize_or_zero()
    }
}

/// Flat forward axis for a yaw angle (yaw 0 looks down -z)
pub fn forward_axis(yaw: f32) -> Vec3 {
    Vec3::new(-yaw.sin(), 0.0, -yaw.cos())
}

/// Flat right axis for a yaw angle
pub fn right_axis(yaw: f32) -> Vec3 {
    Vec3::new(yaw.cos(), 0.0, -yaw.sin())
}

/// Unit view direction including pitch
pub fn view_direction(rotation: Vec3) -> Vec3 {
    let (pitch, yaw) = (rotation.x, rotation.y);
    Vec3::new(-yaw.sin() * pitch.cos(), pitch.sin(), -yaw.cos() * pitch.cos()).normalize_or_zero()
}

/// Movement integrator
pub struct MovementSystem;

impl MovementSystem {
    /// Target speed for this tick before power-up multipliers
    pub fn target_speed(intent: &MovementIntent, config: &MovementConfig) -> f32 {
        let sprinting = intent.sprint && intent.forward && !intent.back && !intent.aiming;
        let speed = if sprinting {
            config.sprint_speed
        } else {
            config.base_speed
        };
        if intent.aiming {
            speed * config.aim_factor
        } else {
            speed
        }
    }

    /// Advance one tick. Returns the new pose when a movement key is held,
    /// `None` for idle ticks so callers don't re-broadcast stationary players.
    pub fn integrate(
        pose: &mut Pose,
        state: &mut MovementState,
        intent: &MovementIntent,
        dt: f32,
        speed_multiplier: f32,
        config: &MovementConfig,
    ) -> Option<Pose> {
        let dt = clamp_delta(dt);
        if !state.velocity.is_finite() {
            state.velocity = Vec3::ZERO;
        }
        let speed_multiplier = if speed_multiplier.is_finite() && speed_multiplier > 0.0 {
            speed_multiplier
        } else {
            1.0
        };

        let direction = intent.direction();
        let horizontal = Vec3::new(state.velocity.x, 0.0, state.velocity.z);

        let horizontal = if direction != Vec3::ZERO {
            let yaw = pose.rotation.y;
            let speed = Self::target_speed(intent, config) * speed_multiplier;
            let desired =
                (forward_axis(yaw) * -direction.z + right_axis(yaw) * direction.x) * speed;
            let blend = (config.acceleration * dt).clamp(0.0, 1.0);
            horizontal + (desired - horizontal) * blend
        } else {
            let base = if state.grounded {
                config.ground_friction
            } else {
                config.air_friction
            };
            horizontal * base.powf(dt * 60.0)
        };

        let mut vertical = state.velocity.y;
        if intent.jump && state.grounded {
            vertical = config.jump_speed;
            state.grounded = false;
        }
        vertical += config.gravity * dt;

        state.velocity = Vec3::new(horizontal.x, vertical, horizontal.z);

        let mut position = pose.position + state.velocity * dt;
        let floor = config.rest_height();
        if position.y <= floor {
            position.y = floor;
            if state.velocity.y < 0.0 {
                state.velocity.y = 0.0;
            }
            state.grounded = true;
        } else {
            state.grounded = false;
        }
        if position.is_finite() {
            pose.position = position;
        } else {
            state.velocity = Vec3::ZERO;
        }

        intent.any_movement().then_some(*pose)
    }

    /// Apply pointer movement. Yaw wraps, pitch stays within ±90°.
    pub fn apply_look(rotation: &mut Vec3, delta: Vec2, config: &MovementConfig) {
        let delta = if delta.is_finite() { delta } else { Vec2::ZERO };
        let yaw = rotation.y - delta.x * config.look_sensitivity;
        let pitch = rotation.x - delta.y * config.look_sensitivity;

        rotation.y = if yaw.is_finite() { yaw.rem_euclid(TAU) } else { 0.0 };
        rotation.x = if pitch.is_finite() {
            pitch.clamp(-FRAC_PI_2, FRAC_PI_2)
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing() -> (Pose, MovementState) {
        (
            Pose {
                position: Vec3::new(0.0, 1.8, 0.0),
                rotation: Vec3::ZERO,
            },
            MovementState::default(),
        )
    }

    fn forward() -> MovementIntent {
        MovementIntent {
            forward: true,
            ..Default::default()
        }
    }

    #[test]
    fn sprint_forward_one_tick_moves_down_negative_z() {
        let config = MovementConfig {
            acceleration: 1_000.0,
            ..Default::default()
        };
        let (mut pose, mut state) = standing();
        let intent = MovementIntent {
            sprint: true,
            ..forward()
        };

        let emitted = MovementSystem::integrate(&mut pose, &mut state, &intent, 0.1, 1.0, &config);

        assert!(state.velocity.z < 0.0);
        assert!((state.velocity.z + 8.0).abs() < 1e-4);
        assert!(pose.position.z < 0.0);
        assert_eq!(pose.position.y, 1.8);
        assert!(state.grounded);
        assert_eq!(emitted, Some(pose));
    }

    #[test]
    fn diagonal_input_is_unit_length() {
        let intent = MovementIntent {
            forward: true,
            right: true,
            ..Default::default()
        };
        assert!((intent.direction().length() - 1.0).abs() < 1e-6);
        assert_eq!(MovementIntent::default().direction(), Vec3::ZERO);
    }

    #[test]
    fn aiming_slows_and_blocks_sprint() {
        let config = MovementConfig::default();
        let intent = MovementIntent {
            sprint: true,
            aiming: true,
            ..forward()
        };
        assert!((MovementSystem::target_speed(&intent, &config) - 3.0).abs() < 1e-6);

        let strafing_back = MovementIntent {
            sprint: true,
            back: true,
            ..Default::default()
        };
        assert_eq!(MovementSystem::target_speed(&strafing_back, &config), 5.0);
    }

    #[test]
    fn idle_ticks_apply_friction_and_emit_nothing() {
        let config = MovementConfig::default();
        let (mut pose, mut state) = standing();
        state.velocity = Vec3::new(4.0, 0.0, 0.0);

        let emitted = MovementSystem::integrate(
            &mut pose,
            &mut state,
            &MovementIntent::default(),
            1.0 / 60.0,
            1.0,
            &config,
        );

        assert!(emitted.is_none());
        assert!((state.velocity.x - 3.2).abs() < 1e-4);
    }

    #[test]
    fn air_keeps_more_momentum_than_ground() {
        let config = MovementConfig::default();
        let (mut ground_pose, mut ground) = standing();
        ground.velocity = Vec3::new(4.0, 0.0, 0.0);
        let (mut air_pose, mut air) = standing();
        air_pose.position.y = 10.0;
        air.grounded = false;
        air.velocity = Vec3::new(4.0, 0.0, 0.0);

        let idle = MovementIntent::default();
        MovementSystem::integrate(&mut ground_pose, &mut ground, &idle, 1.0 / 60.0, 1.0, &config);
        MovementSystem::integrate(&mut air_pose, &mut air, &idle, 1.0 / 60.0, 1.0, &config);

        assert!(air.velocity.x > ground.velocity.x);
    }

    #[test]
    fn jump_leaves_ground_then_lands() {
        let config = MovementConfig::default();
        let (mut pose, mut state) = standing();
        let jump = MovementIntent {
            jump: true,
            ..Default::default()
        };

        MovementSystem::integrate(&mut pose, &mut state, &jump, 1.0 / 60.0, 1.0, &config);
        assert!(!state.grounded);
        assert!(pose.position.y > 1.8);

        // Holding jump mid-air does nothing
        let vy = state.velocity.y;
        MovementSystem::integrate(&mut pose, &mut state, &jump, 1.0 / 60.0, 1.0, &config);
        assert!(state.velocity.y < vy);

        for _ in 0..120 {
            MovementSystem::integrate(
                &mut pose,
                &mut state,
                &MovementIntent::default(),
                1.0 / 60.0,
                1.0,
                &config,
            );
        }
        assert!(state.grounded);
        assert_eq!(pose.position.y, 1.8);
        assert_eq!(state.velocity.y, 0.0);
    }

    #[test]
    fn oversized_delta_is_capped() {
        let config = MovementConfig {
            acceleration: 1_000.0,
            ..Default::default()
        };
        let (mut pose, mut state) = standing();
        MovementSystem::integrate(&mut pose, &mut state, &forward(), 5.0, 1.0, &config);
        assert!((pose.position.z + 5.0 / 30.0).abs() < 1e-4);
    }

    #[test]
    fn nan_delta_is_a_no_op() {
        let config = MovementConfig::default();
        let (mut pose, mut state) = standing();
        MovementSystem::integrate(&mut pose, &mut state, &forward(), f32::NAN, 1.0, &config);
        assert_eq!(pose.position, Vec3::new(0.0, 1.8, 0.0));
        assert!(pose.position.is_finite());
    }

    #[test]
    fn speed_boost_scales_target() {
        let config = MovementConfig {
            acceleration: 1_000.0,
            ..Default::default()
        };
        let (mut pose, mut state) = standing();
        MovementSystem::integrate(&mut pose, &mut state, &forward(), 1.0 / 60.0, 1.5, &config);
        assert!((state.velocity.z + 7.5).abs() < 1e-4);
    }

    #[test]
    fn look_clamps_pitch_and_wraps_yaw() {
        let config = MovementConfig::default();
        let mut rotation = Vec3::ZERO;

        MovementSystem::apply_look(&mut rotation, Vec2::new(0.0, -10_000.0), &config);
        assert_eq!(rotation.x, FRAC_PI_2);

        MovementSystem::apply_look(&mut rotation, Vec2::new(-4_000.0, 0.0), &config);
        assert!(rotation.y >= 0.0 && rotation.y < TAU);
        assert!((rotation.y - (8.0 - TAU)).abs() < 1e-4);

        MovementSystem::apply_look(&mut rotation, Vec2::new(f32::NAN, 1.0), &config);
        assert!(rotation.is_finite());
    }

    #[test]
    fn yaw_turns_the_forward_axis() {
        let yaw = FRAC_PI_2;
        let f = forward_axis(yaw);
        assert!((f.x + 1.0).abs() < 1e-6 && f.z.abs() < 1e-6);
        let r = right_axis(0.0);
        assert_eq!(r, Vec3::new(1.0, 0.0, 0.0));
    }
}
