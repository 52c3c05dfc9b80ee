//! Resource usage of the router process, read once per report.

use tracing::error;

/// CPU, memory and fault counters for this process.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessUsage {
    /// CPU seconds spent in user mode (getrusage).
    pub rusage_user: f64,
    /// CPU seconds spent in kernel mode (getrusage).
    pub rusage_system: f64,
    pub minor_faults: u64,
    pub major_faults: u64,
    pub user_time_sec: f64,
    pub system_time_sec: f64,
    pub vsize: u64,
    pub rss: u64,
}

/// Raw fields of `/proc/self/stat`, before unit conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcStat {
    pub minor_faults: u64,
    pub major_faults: u64,
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    pub vsize: u64,
    pub rss_pages: i64,
}

/// Parse the contents of `/proc/<pid>/stat`.
///
/// The command name is parenthesized and may itself contain spaces or
/// parentheses, so fields are counted from the last `)`.
pub fn parse_proc_stat(contents: &str) -> Option<ProcStat> {
    let end = contents.rfind(')')?;
    // fields after the name start at `state` (field 3 in proc(5))
    let fields: Vec<&str> = contents[end + 1..].split_whitespace().collect();
    let field = |n: usize| fields.get(n - 3).copied();
    let uint = |n: usize| field(n).and_then(|f| f.parse::<u64>().ok());

    Some(ProcStat {
        minor_faults: uint(10)?,
        major_faults: uint(12)?,
        utime_ticks: uint(14)?,
        stime_ticks: uint(15)?,
        vsize: uint(23)?,
        rss_pages: field(24)?.parse().ok()?,
    })
}

/// Query the OS for this process's resource usage.
///
/// Failures are logged and leave the affected fields at zero.
pub fn usage() -> ProcessUsage {
    let mut usage = ProcessUsage::default();

    match rusage() {
        Ok((user, system)) => {
            usage.rusage_user = user;
            usage.rusage_system = system;
        }
        Err(e) => error!(error = %e, "getrusage failed"),
    }

    match std::fs::read_to_string("/proc/self/stat") {
        Ok(contents) => match parse_proc_stat(&contents) {
            Some(stat) => {
                let ticks = clock_ticks_per_sec();
                usage.minor_faults = stat.minor_faults;
                usage.major_faults = stat.major_faults;
                usage.user_time_sec = stat.utime_ticks as f64 / ticks;
                usage.system_time_sec = stat.stime_ticks as f64 / ticks;
                usage.vsize = stat.vsize;
                usage.rss = (stat.rss_pages.max(0) as u64).saturating_mul(page_size());
            }
            None => error!("failed to parse /proc/self/stat"),
        },
        Err(e) => error!(error = %e, "failed to read /proc/self/stat"),
    }

    usage
}

fn rusage() -> std::io::Result<(f64, f64)> {
    use std::mem;

    // SAFETY: `rusage` is plain data and getrusage only writes into it.
    let ru = unsafe {
        let mut ru: libc::rusage = mem::zeroed();
        if libc::getrusage(libc::RUSAGE_SELF, &mut ru) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        ru
    };

    let secs = |tv: libc::timeval| tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0;
    Ok((secs(ru.ru_utime), secs(ru.ru_stime)))
}

fn clock_ticks_per_sec() -> f64 {
    // SAFETY: sysconf has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as f64 } else { 100.0 }
}

fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "4242 (router (main)) S 1 4242 4242 0 -1 4194560 1500 0 3 0 \
                          250 75 0 0 20 0 8 0 12345 104857600 2048 18446744073709551615 \
                          1 1 0 0 0 0 0 4096 0 0 0 0 17 2 0 0 0 0 0";

    #[test]
    fn test_parse_proc_stat() {
        let stat = parse_proc_stat(SAMPLE).unwrap();
        assert_eq!(stat.minor_faults, 1500);
        assert_eq!(stat.major_faults, 3);
        assert_eq!(stat.utime_ticks, 250);
        assert_eq!(stat.stime_ticks, 75);
        assert_eq!(stat.vsize, 104857600);
        assert_eq!(stat.rss_pages, 2048);
    }

    #[test]
    fn test_parse_truncated() {
        assert_eq!(parse_proc_stat("4242 (router) S 1 2 3"), None);
        assert_eq!(parse_proc_stat("garbage"), None);
    }

    #[test]
    fn test_negative_rss_is_parsed() {
        let line = SAMPLE.replace(" 2048 ", " -5 ");
        assert_eq!(parse_proc_stat(&line).unwrap().rss_pages, -5);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_usage_reads_self() {
        let usage = usage();
        assert!(usage.rss > 0);
        assert!(usage.vsize > 0);
    }
}
