//! Kernel console logging.
//!
//! `kprint!`/`kprintln!` write synchronously to the PL011 on ARM, to the test
//! harness' stdout in host tests, and nowhere otherwise. Output is unbuffered
//! so it is usable from trap handlers with interrupts masked.

use core::fmt::{self, Write};

/// Sink behind the logging macros.
pub struct KernelWriter;

impl Write for KernelWriter {
    #[cfg(target_arch = "arm")]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        crate::bsp::pl011::UartWriter.write_str(s)
    }

    #[cfg(all(not(target_arch = "arm"), test))]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        std::print!("{s}");
        Ok(())
    }

    #[cfg(all(not(target_arch = "arm"), not(test)))]
    fn write_str(&mut self, _s: &str) -> fmt::Result {
        Ok(())
    }
}

/// Print a formatted string to the kernel console.
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::print::KernelWriter, $($arg)*);
    }};
}

/// Print a formatted string to the kernel console with a newline.
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::kprint!($($arg)*);
        $crate::kprint!("\n");
    }};
}

/// Per-interrupt trace logging, compiled in with the `trace-irq` feature.
#[macro_export]
#[cfg(feature = "trace-irq")]
macro_rules! ktrace {
    ($($arg:tt)*) => {
        $crate::kprintln!($($arg)*)
    };
}

/// Per-interrupt trace logging, compiled in with the `trace-irq` feature.
#[macro_export]
#[cfg(not(feature = "trace-irq"))]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        if false {
            $crate::kprintln!($($arg)*)
        }
    }};
}
