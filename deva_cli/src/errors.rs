use deva_core::DevaError;

/// Print a runtime diagnostic the way a driver script would report it:
/// one line, already carrying whatever file/line the executor tagged it
/// with.
pub fn print_error(err: &DevaError) {
    eprintln!("{err}");
}
