//! Polled input state
//!
//! The host translates whatever devices it has into this state; the
//! simulation reads it once per tick.

use glam::Vec2;

/// Input as seen by the simulation
pub trait InputSource {
    fn forward(&self) -> bool;
    fn back(&self) -> bool;
    fn left(&self) -> bool;
    fn right(&self) -> bool;
    fn sprint(&self) -> bool;
    fn aiming(&self) -> bool;

    /// One-shot jump request, cleared when read
    fn take_jump(&mut self) -> bool;
    /// One-shot trigger pull, cleared when read
    fn take_fire(&mut self) -> bool;
    /// One-shot reload request, cleared when read
    fn take_reload(&mut self) -> bool;
    /// Pointer movement accumulated since the last tick, cleared when read
    fn take_look_delta(&mut self) -> Vec2;

    fn any_movement(&self) -> bool {
        self.forward() || self.back() || self.left() || self.right()
    }
}

/// Plain input state with setters for the host
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub aiming: bool,
    jump: bool,
    fire: bool,
    reload: bool,
    look_delta: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_movement(&mut self, forward: bool, back: bool, left: bool, right: bool) {
        self.forward = forward;
        self.back = back;
        self.left = left;
        self.right = right;
    }

    pub fn set_sprint(&mut self, sprint: bool) {
        self.sprint = sprint;
    }

    pub fn set_aiming(&mut self, aiming: bool) {
        self.aiming = aiming;
    }

    pub fn request_jump(&mut self) {
        self.jump = true;
    }

    pub fn request_fire(&mut self) {
        self.fire = true;
    }

    pub fn request_reload(&mut self) {
        self.reload = true;
    }

    /// Accumulate pointer movement. Non-finite deltas are dropped.
    pub fn add_look_delta(&mut self, dx: f32, dy: f32) {
        let delta = Vec2::new(dx, dy);
        if delta.is_finite() {
            self.look_delta += delta;
        }
    }

    /// Release every held key (focus lost, pointer unlocked)
    pub fn release_all(&mut self) {
        *self = Self::default();
    }
}

impl InputSource for InputState {
    fn forward(&self) -> bool {
        self.forward
    }

    fn back(&self) -> bool {
        self.back
    }

    fn left(&self) -> bool {
        self.left
    }

    fn right(&self) -> bool {
        self.right
    }

    fn sprint(&self) -> bool {
        self.sprint
    }

    fn aiming(&self) -> bool {
        self.aiming
    }

    fn take_jump(&mut self) -> bool {
        std::mem::take(&mut self.jump)
    }

    fn take_fire(&mut self) -> bool {
        std::mem::take(&mut self.fire)
    }

    fn take_reload(&mut self) -> bool {
        std::mem::take(&mut self.reload)
    }

    fn take_look_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.look_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_requests_clear_on_read() {
        let mut input = InputState::new();
        input.request_jump();
        input.request_fire();
        input.add_look_delta(3.0, -1.0);
        input.add_look_delta(f32::NAN, 1.0);

        assert!(input.take_jump());
        assert!(!input.take_jump());
        assert!(input.take_fire());
        assert_eq!(input.take_look_delta(), Vec2::new(3.0, -1.0));
        assert_eq!(input.take_look_delta(), Vec2::ZERO);
    }
}
