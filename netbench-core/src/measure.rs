//! High-Precision Timing
//!
//! Wall-clock time comes from `std::time::Instant`. Alongside it we read the
//! hardware tick counter (RDTSCP on x86_64, CNTVCT_EL0 on AArch64) so suites
//! can report cycle counts where the platform has them.

use std::time::Instant;

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_ticks() -> u64 {
    // SAFETY: RDTSCP is present on every x86_64 CPU we target and has no
    // memory side effects.
    unsafe {
        let mut aux: u32 = 0;
        std::arch::x86_64::__rdtscp(&mut aux)
    }
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_ticks() -> u64 {
    let ticks: u64;
    // SAFETY: CNTVCT_EL0 is readable from EL0 on all AArch64 implementations.
    unsafe {
        std::arch::asm!("mrs {}, cntvct_el0", out(reg) ticks, options(nostack, nomem));
    }
    ticks
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn read_ticks() -> u64 {
    0
}

/// `true` when [`Elapsed::cycles`] carries real hardware ticks.
pub const HAS_CYCLE_COUNTER: bool = cfg!(target_arch = "x86_64") || cfg!(target_arch = "aarch64");

/// Time and ticks spent between [`Timer::start`] and [`Timer::stop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Elapsed {
    /// Wall-clock nanoseconds
    pub nanos: u64,
    /// Hardware ticks, 0 without a cycle counter
    pub cycles: u64,
}

/// Stopwatch for a single measured iteration.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    wall: Instant,
    ticks: u64,
}

impl Timer {
    /// Start timing now.
    #[inline(always)]
    pub fn start() -> Self {
        let ticks = read_ticks();
        Self {
            wall: Instant::now(),
            ticks,
        }
    }

    /// Read the elapsed time without consuming the timer.
    #[inline(always)]
    pub fn stop(&self) -> Elapsed {
        let nanos = self.wall.elapsed().as_nanos() as u64;
        Elapsed {
            nanos,
            cycles: read_ticks().saturating_sub(self.ticks),
        }
    }

    /// Nanoseconds since the timer started.
    #[inline(always)]
    pub fn elapsed_ns(&self) -> u128 {
        self.wall.elapsed().as_nanos()
    }
}

/// Pin the calling thread to `cpu`, keeping tick readings on one core.
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> std::io::Result<()> {
    // SAFETY: `cpu_set_t` is plain data; zeroed is its empty state and the
    // pointer handed to the kernel lives for the whole call.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };

    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// CPU pinning is a no-op off Linux.
#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) -> std::io::Result<()> {
    Ok(())
}
