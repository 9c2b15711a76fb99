//! # MULE Control Core
//!
//! Runs the control core against the simulation HAL at the nominal
//! control cadence. Robot images swap the HAL backend; everything above
//! the [`mule_hal::Hal`] seam is identical on the bench and on the
//! robot.
//!
//! With the `rt` feature the loop paces itself with
//! `clock_nanosleep(TIMER_ABSTIME)` under `SCHED_FIFO`; without it a
//! plain sleep loop approximates the cadence.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::{info, warn};

use mule_common::consts::{CONTROL_PERIOD_US, MAIN_EXECS_PER_LONG_EXEC, TICKS_PER_SEC};
use mule_control::config::ControlConfig;
use mule_control::tick::Scheduler;
use mule_hal::sim::SimHal;

#[derive(Parser, Debug)]
#[command(name = "mule_control", about = "MULE real-time control core")]
struct Args {
    /// Control configuration TOML; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds (0 = run until killed).
    #[arg(long, default_value_t = 0)]
    duration_s: u64,

    /// Real-time priority for the control thread (rt builds only).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match ControlConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(%e, "config load failed; using defaults");
                ControlConfig::default()
            }
        },
        None => ControlConfig::default(),
    };

    if let Err(e) = rt_setup(args.rt_priority) {
        warn!(%e, "rt setup unavailable; continuing without it");
    }

    let mut scheduler = Scheduler::new(SimHal::default(), config);
    info!(period_us = CONTROL_PERIOD_US, "control core starting");

    run_loop(&mut scheduler, args.duration_s);

    let stats = scheduler.stats;
    info!(
        cycles = stats.cycle_count,
        avg_ns = stats.avg_cycle_ns(),
        max_ns = stats.max_cycle_ns,
        overruns = stats.overruns,
        "control core stopped"
    );
}

/// Long-execution slot: hand outbound status bytes to the host side so
/// the pipe never backs up.
fn drain_host_pipe(scheduler: &mut Scheduler<SimHal>) {
    let mut sink = [0u8; 256];
    while scheduler.hal_mut().supervisor_recv(&mut sink) == sink.len() {}
}

/// Pin scheduling for the control thread (rt builds).
#[cfg(feature = "rt")]
fn rt_setup(priority: i32) -> Result<(), String> {
    use nix::sys::mman::{MlockallFlags, mlockall};

    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| format!("mlockall failed: {e}"))?;

    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        return Err(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {}",
            std::io::Error::last_os_error()
        ));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_setup(_priority: i32) -> Result<(), String> {
    Ok(())
}

/// Drift-free absolute-time pacing (rt builds).
#[cfg(feature = "rt")]
fn run_loop(scheduler: &mut Scheduler<SimHal>, duration_s: u64) {
    use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

    let clock = ClockId::CLOCK_MONOTONIC;
    let period_ns = CONTROL_PERIOD_US as i64 * 1_000;
    let max_ticks = duration_s * TICKS_PER_SEC as u64;

    let mut next_wake = match clock_gettime(clock) {
        Ok(t) => t,
        Err(e) => {
            warn!(%e, "clock_gettime failed");
            return;
        }
    };

    loop {
        next_wake = timespec_add_ns(next_wake, period_ns);

        let start = Instant::now();
        scheduler.step(None, None);
        let elapsed_ns = start.elapsed().as_nanos() as i64;
        scheduler.stats.record(elapsed_ns);
        if elapsed_ns > period_ns {
            scheduler.stats.overruns += 1;
            warn!(elapsed_ns, period_ns, "cycle overrun");
        }
        if scheduler.stats.cycle_count % MAIN_EXECS_PER_LONG_EXEC as u64 == 0 {
            drain_host_pipe(scheduler);
        }

        if max_ticks != 0 && scheduler.stats.cycle_count >= max_ticks {
            return;
        }
        let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
    }
}

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// Approximate pacing for desktop runs.
#[cfg(not(feature = "rt"))]
fn run_loop(scheduler: &mut Scheduler<SimHal>, duration_s: u64) {
    let period = std::time::Duration::from_micros(CONTROL_PERIOD_US as u64);
    let max_ticks = duration_s * TICKS_PER_SEC as u64;

    loop {
        let start = Instant::now();
        scheduler.step(None, None);
        let elapsed = start.elapsed();
        scheduler.stats.record(elapsed.as_nanos() as i64);
        if elapsed > period {
            scheduler.stats.overruns += 1;
        }
        if scheduler.stats.cycle_count % MAIN_EXECS_PER_LONG_EXEC as u64 == 0 {
            drain_host_pipe(scheduler);
        }

        if scheduler.stats.cycle_count % 1_000 == 0 {
            let pose = scheduler.pose();
            info!(
                tick = scheduler.tick_count(),
                x = format_args!("{:.1}", pose.x_mm),
                y = format_args!("{:.1}", pose.y_mm),
                heading = format_args!("{:.3}", pose.heading_rad),
                "status"
            );
        }

        if max_ticks != 0 && scheduler.stats.cycle_count >= max_ticks {
            return;
        }
        if let Some(remaining) = period.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        }
    }
}
