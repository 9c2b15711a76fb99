//! Tick latency benchmarks.
//!
//! The control budget is one 5 ms period; a full tick against the
//! simulation backend must come in orders of magnitude below that.

use criterion::{Criterion, criterion_group, criterion_main};

use mule_common::msg::{Command, PathSegmentMsg, SpeedSpec};
use mule_control::config::ControlConfig;
use mule_control::tick::Scheduler;
use mule_hal::sim::SimHal;

fn idle_tick(c: &mut Criterion) {
    let mut scheduler = Scheduler::new(SimHal::default(), ControlConfig::default());
    c.bench_function("idle_tick", |b| {
        b.iter(|| scheduler.step(None, None));
    });
}

fn path_follow_tick(c: &mut Criterion) {
    let mut scheduler = Scheduler::new(SimHal::default(), ControlConfig::default());
    scheduler.dispatch(Command::AppendPathSegment(PathSegmentMsg::Line {
        x0_mm: 0.0,
        y0_mm: 0.0,
        x1_mm: 1.0e9, // effectively endless
        y1_mm: 0.0,
        speed: SpeedSpec {
            target_speed_mmps: 100.0,
            accel_mmps2: 200.0,
            decel_mmps2: 500.0,
        },
    }));
    scheduler.dispatch(Command::StartPath);
    c.bench_function("path_follow_tick", |b| {
        b.iter(|| scheduler.step(None, None));
    });
}

fn wheel_loop_only(c: &mut Criterion) {
    use mule_control::config::WheelConfig;
    use mule_control::wheel::WheelController;

    let mut wheels = WheelController::new(WheelConfig::default());
    wheels.set_targets(100.0, 100.0, 200.0, 200.0);
    let mut pos = 0.0;
    c.bench_function("wheel_loop", |b| {
        b.iter(|| {
            pos += 0.03;
            wheels.update(pos, pos, 0.005)
        });
    });
}

criterion_group!(benches, idle_tick, path_follow_tick, wheel_loop_only);
criterion_main!(benches);
