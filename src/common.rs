/// Early return unless `$check` holds.
///
/// The single argument form returns `None`, the two argument form returns
/// `Err($ret)`.
#[macro_export]
macro_rules! guard {
    ($check:expr) => {
        if !($check)
        {
            return None;
        }
    };
    ($check:expr, $ret:expr) => {
        if !($check)
        {
            return Err($ret);
        }
    };
}
