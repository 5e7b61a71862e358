use std::time::Duration;

/// Converts a delay into the integer milliseconds a host timer takes.
///
/// Sub-millisecond remainders round up, anything below the host's
/// `resolution` is raised to it, and anything beyond `u32::MAX` ms is capped.
///
/// ```rust
/// use std::time::Duration;
/// use rxui::scheduler::to_timer_millis;
///
/// let ms = Duration::from_millis(1);
/// assert_eq!(to_timer_millis(Duration::from_micros(1500), ms), 2);
/// assert_eq!(to_timer_millis(Duration::ZERO, ms), 1);
/// ```
pub fn to_timer_millis(delay: Duration, resolution: Duration) -> u32 {
  let ms = ceil_millis(delay).max(ceil_millis(resolution));
  u32::try_from(ms).unwrap_or(u32::MAX)
}

fn ceil_millis(d: Duration) -> u128 {
  let ms = d.as_millis();
  if d.subsec_nanos() % 1_000_000 == 0 { ms } else { ms + 1 }
}
