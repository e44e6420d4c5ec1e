//! Output formatting utilities

use colored::Colorize;
use std::io::Write;

/// Verb reference printed for `help`, unknown verbs and argument errors
pub const USAGE: &str = "\
Usage:
    pod-isolation [OPTIONS] <COMMAND> [ARGS]...

Inspect or flush iptables rules inside pod network namespaces on this node.

Commands:
    show [<namespace>] <pod>     Show the pod's iptables rules
    clear [<namespace>] <pod>    Flush the pod's iptables rules
    node-clear                   Flush iptables rules of every pod on this node
    cluster-clear                Like node-clear, using in-cluster credentials (DaemonSet use)

    help                         Show this help

Examples:
    pod-isolation show busybox-ds-vw7zv
    pod-isolation clear default busybox-ds-vw7zv
    pod-isolation node-clear
";

/// Where usage text goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Print the usage text
pub fn print_usage(stream: Stream) {
    match stream {
        Stream::Stdout => print!("{}", USAGE),
        Stream::Stderr => eprint!("{}", USAGE),
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Write captured command output exactly as received
pub fn print_verbatim(output: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()
}
