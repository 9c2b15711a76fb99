//! Animation controller: canned actuator tracks synced to the tick.
//!
//! A track is a list of keyframes ordered by tick offset; each keyframe
//! names the actuator targets it drives. While a track plays, the
//! controller owns every actuator the track references — the scheduler
//! suppresses other writers on those channels. The active keyframe is
//! the one with the largest offset not past the elapsed tick count; the
//! track finishes once elapsed time passes the final keyframe's offset
//! plus its duration, releasing ownership.

use bitflags::bitflags;
use heapless::Vec as HVec;

use mule_common::consts::{MAX_KEYFRAMES, NUM_LEDS, TICKS_PER_SEC};
use mule_common::msg::Rgba;

bitflags! {
    /// Actuators a track can own.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ActuatorMask: u8 {
        const WHEELS = 0x01;
        const HEAD   = 0x02;
        const LIFT   = 0x04;
        const LEDS   = 0x08;
    }
}

/// One keyframe: a tick offset, a hold duration, and the targets it
/// drives. `None` fields leave that actuator to its normal controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keyframe {
    /// Offset from the start of the track [ticks].
    pub tick_offset: u32,
    /// How long the final keyframe holds before the track ends [ticks].
    pub duration: u32,
    /// Wheel speed targets (left, right) [mm/s].
    pub wheels: Option<(f64, f64)>,
    /// Head angle target [rad].
    pub head: Option<f64>,
    /// Lift angle target [rad].
    pub lift: Option<f64>,
    /// LED colours per channel.
    pub leds: [Option<Rgba>; NUM_LEDS],
}

/// An ordered sequence of keyframes.
#[derive(Debug, Clone, Default)]
pub struct AnimationTrack {
    keyframes: HVec<Keyframe, MAX_KEYFRAMES>,
}

impl AnimationTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a keyframe; offsets must be non-decreasing. Returns false
    /// when the track is full or the offset goes backwards.
    pub fn push(&mut self, keyframe: Keyframe) -> bool {
        if let Some(last) = self.keyframes.last() {
            if keyframe.tick_offset < last.tick_offset {
                return false;
            }
        }
        self.keyframes.push(keyframe).is_ok()
    }

    /// Union of the actuators any keyframe references.
    pub fn mask(&self) -> ActuatorMask {
        let mut mask = ActuatorMask::empty();
        for k in &self.keyframes {
            if k.wheels.is_some() {
                mask |= ActuatorMask::WHEELS;
            }
            if k.head.is_some() {
                mask |= ActuatorMask::HEAD;
            }
            if k.lift.is_some() {
                mask |= ActuatorMask::LIFT;
            }
            if k.leds.iter().any(Option::is_some) {
                mask |= ActuatorMask::LEDS;
            }
        }
        mask
    }

    /// Total length of the track [ticks].
    pub fn length_ticks(&self) -> u32 {
        self.keyframes
            .last()
            .map(|k| k.tick_offset + k.duration)
            .unwrap_or(0)
    }

    fn active_keyframe(&self, elapsed: u32) -> Option<&Keyframe> {
        self.keyframes
            .iter()
            .rev()
            .find(|k| k.tick_offset <= elapsed)
    }

    fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }
}

/// Targets the animation emits on one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimOutput {
    pub wheels: Option<(f64, f64)>,
    pub head: Option<f64>,
    pub lift: Option<f64>,
    pub leds: [Option<Rgba>; NUM_LEDS],
}

/// Plays one track at a time.
#[derive(Debug, Clone, Default)]
pub struct AnimationController {
    track: AnimationTrack,
    playing: bool,
    start_tick: u32,
    id: u8,
    tag: u8,
}

impl AnimationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a canned track by id. Returns false for unknown ids.
    pub fn play(&mut self, id: u8, tag: u8, now_tick: u32) -> bool {
        match builtin_track(id) {
            Some(track) => {
                self.play_track(track, now_tick);
                self.id = id;
                self.tag = tag;
                true
            }
            None => false,
        }
    }

    /// Start an arbitrary track.
    pub fn play_track(&mut self, track: AnimationTrack, now_tick: u32) {
        self.playing = !track.is_empty();
        self.track = track;
        self.start_tick = now_tick;
    }

    /// Stop playback and release ownership.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Tag the supervisor attached to the running animation.
    #[inline]
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Actuators currently owned; empty when idle.
    pub fn owned(&self) -> ActuatorMask {
        if self.playing {
            self.track.mask()
        } else {
            ActuatorMask::empty()
        }
    }

    /// Emit this tick's targets. Returns `None` targets and reports
    /// `finished = true` on the tick playback completes.
    pub fn update(&mut self, now_tick: u32) -> (AnimOutput, bool) {
        if !self.playing {
            return (AnimOutput::default(), false);
        }
        // Tick arithmetic survives counter wrap.
        let elapsed = now_tick.wrapping_sub(self.start_tick);
        if elapsed >= self.track.length_ticks() {
            self.playing = false;
            return (AnimOutput::default(), true);
        }
        let out = match self.track.active_keyframe(elapsed) {
            Some(k) => AnimOutput {
                wheels: k.wheels,
                head: k.head,
                lift: k.lift,
                leds: k.leds,
            },
            None => AnimOutput::default(),
        };
        (out, false)
    }

    /// Return to the boot state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The canned track library.
///
/// | id | track |
/// |----|-------|
/// | 0  | head nod |
/// | 1  | lift pump |
/// | 2  | LED pulse on channel 0 |
/// | 3  | happy wiggle (wheels) |
pub fn builtin_track(id: u8) -> Option<AnimationTrack> {
    let half_sec = TICKS_PER_SEC / 2;
    let mut track = AnimationTrack::new();
    match id {
        0 => {
            track.push(Keyframe {
                tick_offset: 0,
                duration: 0,
                head: Some(0.35),
                ..Keyframe::default()
            });
            track.push(Keyframe {
                tick_offset: half_sec,
                duration: 0,
                head: Some(-0.25),
                ..Keyframe::default()
            });
            track.push(Keyframe {
                tick_offset: 2 * half_sec,
                duration: half_sec,
                head: Some(0.0),
                ..Keyframe::default()
            });
        }
        1 => {
            track.push(Keyframe {
                tick_offset: 0,
                duration: 0,
                lift: Some(0.6),
                ..Keyframe::default()
            });
            track.push(Keyframe {
                tick_offset: half_sec,
                duration: half_sec,
                lift: Some(-0.1),
                ..Keyframe::default()
            });
        }
        2 => {
            let mut on = [None; NUM_LEDS];
            on[0] = Some(Rgba::BLUE);
            let mut off = [None; NUM_LEDS];
            off[0] = Some(Rgba::OFF);
            track.push(Keyframe {
                tick_offset: 0,
                duration: 0,
                leds: on,
                ..Keyframe::default()
            });
            track.push(Keyframe {
                tick_offset: half_sec,
                duration: half_sec,
                leds: off,
                ..Keyframe::default()
            });
        }
        3 => {
            track.push(Keyframe {
                tick_offset: 0,
                duration: 0,
                wheels: Some((60.0, -60.0)),
                ..Keyframe::default()
            });
            track.push(Keyframe {
                tick_offset: half_sec / 2,
                duration: 0,
                wheels: Some((-60.0, 60.0)),
                ..Keyframe::default()
            });
            track.push(Keyframe {
                tick_offset: half_sec,
                duration: half_sec / 2,
                wheels: Some((0.0, 0.0)),
                ..Keyframe::default()
            });
        }
        _ => return None,
    }
    Some(track)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn two_frame_track() -> AnimationTrack {
        let mut t = AnimationTrack::new();
        t.push(Keyframe {
            tick_offset: 0,
            duration: 0,
            head: Some(0.3),
            ..Keyframe::default()
        });
        t.push(Keyframe {
            tick_offset: 10,
            duration: 5,
            head: Some(-0.2),
            wheels: Some((40.0, 40.0)),
            ..Keyframe::default()
        });
        t
    }

    #[test]
    fn offsets_must_not_go_backwards() {
        let mut t = AnimationTrack::new();
        assert!(t.push(Keyframe {
            tick_offset: 10,
            ..Keyframe::default()
        }));
        assert!(!t.push(Keyframe {
            tick_offset: 5,
            ..Keyframe::default()
        }));
    }

    #[test]
    fn mask_is_union_of_keyframes() {
        let t = two_frame_track();
        assert_eq!(t.mask(), ActuatorMask::HEAD | ActuatorMask::WHEELS);
    }

    #[test]
    fn active_keyframe_is_largest_offset_not_past_elapsed() {
        let mut a = AnimationController::new();
        a.play_track(two_frame_track(), 100);

        let (out, _) = a.update(100);
        assert_eq!(out.head, Some(0.3));
        assert!(out.wheels.is_none());

        let (out, _) = a.update(112);
        assert_eq!(out.head, Some(-0.2));
        assert_eq!(out.wheels, Some((40.0, 40.0)));
    }

    #[test]
    fn finishes_after_last_offset_plus_duration() {
        let mut a = AnimationController::new();
        a.play_track(two_frame_track(), 0);
        let (_, finished) = a.update(14);
        assert!(!finished);
        assert!(a.is_playing());
        let (out, finished) = a.update(15);
        assert!(finished);
        assert!(out.head.is_none());
        assert!(!a.is_playing());
        assert!(a.owned().is_empty());
    }

    #[test]
    fn ownership_released_on_stop() {
        let mut a = AnimationController::new();
        a.play_track(two_frame_track(), 0);
        assert!(a.owned().contains(ActuatorMask::HEAD));
        a.stop();
        assert!(a.owned().is_empty());
    }

    #[test]
    fn survives_tick_wraparound() {
        let mut a = AnimationController::new();
        a.play_track(two_frame_track(), u32::MAX - 2);
        // 5 ticks after start, across the wrap.
        let (out, finished) = a.update(2);
        assert!(!finished);
        assert_eq!(out.head, Some(0.3));
    }

    #[test]
    fn builtin_ids_resolve() {
        for id in 0..4 {
            assert!(builtin_track(id).is_some(), "track {id}");
        }
        assert!(builtin_track(99).is_none());
    }

    #[test]
    fn play_unknown_id_is_rejected() {
        let mut a = AnimationController::new();
        assert!(!a.play(99, 0, 0));
        assert!(!a.is_playing());
        assert!(a.play(0, 7, 0));
        assert_eq!(a.tag(), 7);
    }
}
