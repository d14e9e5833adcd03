//! Real-time scheduling for the sensor capture (Linux SCHED_FIFO / affinity / mlockall).
//!
//! A user-space process cannot mask interrupts, so on Linux the 24-pulse
//! capture gets the closest equivalent: the capturing thread is raised to
//! SCHED_FIFO for the duration of the read, and `--rt` additionally pins the
//! process to one CPU and locks its pages.

use crate::cli::RtLock;

#[cfg(target_os = "linux")]
const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

/// Process-wide tuning for `run --rt`. Failures are logged, never fatal.
#[cfg(target_os = "linux")]
pub fn setup_rt_once(prio: Option<i32>, lock: RtLock, rt_cpu: Option<usize>) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    RT_ONCE.get_or_init(|| {
        match apply_mem_lock(lock) {
            Ok(()) => tracing::info!(lock = ?lock, "rt: memory lock applied"),
            Err(err) => tracing::warn!(error = %err, "rt: mlockall failed"),
        }
        match apply_fifo_priority(prio) {
            Ok(p) => tracing::info!(priority = p, "rt: SCHED_FIFO"),
            Err(err) => tracing::warn!(
                error = %err,
                "rt: SCHED_FIFO not applied; needs CAP_SYS_NICE or root"
            ),
        }
        match apply_affinity(rt_cpu.unwrap_or(0)) {
            Ok(cpu) => tracing::info!(cpu, "rt: pinned"),
            Err(err) => tracing::warn!(error = %err, "rt: affinity not applied"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(_prio: Option<i32>, _lock: RtLock, _rt_cpu: Option<usize>) {
    tracing::warn!("rt: real-time scheduling is only supported on Linux");
}

#[cfg(target_os = "linux")]
fn apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => MCL_CURRENT,
        RtLock::All => MCL_CURRENT | MCL_FUTURE,
    };
    if unsafe { mlockall(flags) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    let retryable = matches!(err.raw_os_error(), Some(c) if c == libc::EPERM || c == libc::ENOMEM);
    // current|future can exceed the memlock limit where current alone fits
    if lock == RtLock::All && retryable && unsafe { mlockall(MCL_CURRENT) } == 0 {
        tracing::warn!(error = %err, "rt: mlockall(current|future) failed; locked current only");
        return Ok(());
    }
    let mut msg = format!("mlockall: {err}");
    if retryable {
        msg.push_str("; needs CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

#[cfg(target_os = "linux")]
fn fifo_priority_range() -> (i32, i32) {
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    if min < 0 || max < 0 { (1, 99) } else { (min, max) }
}

#[cfg(target_os = "linux")]
fn apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
    let (min, max) = fifo_priority_range();
    let prio = prio.unwrap_or(max).clamp(min, max);
    let param = libc::sched_param {
        sched_priority: prio,
    };
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(prio)
}

#[cfg(target_os = "linux")]
fn apply_affinity(target: usize) -> eyre::Result<usize> {
    use libc::{CPU_ISSET, CPU_SET, CPU_ZERO};

    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if online < 1 {
        eyre::bail!("_SC_NPROCESSORS_ONLN < 1");
    }
    if target as libc::c_long >= online || target >= MAX_CPUSET_BITS {
        eyre::bail!("requested CPU {target} >= online {online}");
    }
    let size = std::mem::size_of::<libc::cpu_set_t>();
    let mut allowed: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    if unsafe { libc::sched_getaffinity(0, size, &mut allowed) } != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    if !unsafe { CPU_ISSET(target, &allowed) } {
        eyre::bail!("CPU {target} not permitted by current affinity mask");
    }
    let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    unsafe {
        CPU_ZERO(&mut desired);
        CPU_SET(target, &mut desired);
    }
    if unsafe { libc::sched_setaffinity(0, size, &desired) } != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(target)
}

/// Capture guard for the HX711 on Linux GPIO.
///
/// `enter` raises the calling thread to the top SCHED_FIFO priority and
/// `exit` restores the policy it had. A thread already running SCHED_FIFO
/// (e.g. after `--rt`) is left alone. Without CAP_SYS_NICE the first refusal
/// is logged and later reads skip the syscall.
#[cfg(target_os = "linux")]
#[cfg_attr(not(feature = "hardware"), allow(dead_code))]
#[derive(Debug, Default)]
pub struct FifoSection {
    /// Policy and priority to restore on exit.
    saved: Option<(libc::c_int, libc::c_int)>,
    denied: bool,
    enters: usize,
    exits: usize,
}

#[cfg(target_os = "linux")]
#[cfg_attr(not(feature = "hardware"), allow(dead_code))]
impl FifoSection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(all(test, target_os = "linux"))]
impl FifoSection {
    pub fn enters(&self) -> usize {
        self.enters
    }

    pub fn exits(&self) -> usize {
        self.exits
    }

    /// True between an `enter` that raised the policy and its `exit`.
    pub fn is_boosted(&self) -> bool {
        self.saved.is_some()
    }

    pub fn is_denied(&self) -> bool {
        self.denied
    }
}

#[cfg(target_os = "linux")]
impl weighnode_traits::CriticalSection for FifoSection {
    fn enter(&mut self) {
        self.enters += 1;
        if self.denied {
            return;
        }
        let policy = unsafe { libc::sched_getscheduler(0) };
        if policy < 0 || policy == libc::SCHED_FIFO {
            return;
        }
        let mut current = libc::sched_param { sched_priority: 0 };
        if unsafe { libc::sched_getparam(0, &mut current) } != 0 {
            return;
        }
        let (_, max) = fifo_priority_range();
        let boost = libc::sched_param {
            sched_priority: max,
        };
        if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &boost) } == 0 {
            self.saved = Some((policy, current.sched_priority));
        } else {
            self.denied = true;
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "hx711 capture runs without SCHED_FIFO; needs CAP_SYS_NICE or root"
            );
        }
    }

    fn exit(&mut self) {
        self.exits += 1;
        debug_assert!(self.exits <= self.enters, "capture section exit without enter");
        if let Some((policy, prio)) = self.saved.take() {
            let param = libc::sched_param {
                sched_priority: prio,
            };
            if unsafe { libc::sched_setscheduler(0, policy, &param) } != 0 {
                tracing::warn!(
                    error = %std::io::Error::last_os_error(),
                    "restoring scheduler policy after capture failed"
                );
            }
        }
    }
}
