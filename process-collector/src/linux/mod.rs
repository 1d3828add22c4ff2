//! Linux `/proc`-backed process metrics, refreshed on every scrape.

mod netstat;

use std::io;

use procfs::process::{LimitValue, Process, Stat};
use prom_instrument::collector::Collector;
use prom_instrument::error::{MetricsError, Result};
use prom_instrument::factory::Factory;
use prom_instrument::metrics::counter::Counter;
use prom_instrument::metrics::gauge::Gauge;
use prom_instrument::opts::CommonOpts;

use netstat::Netstat;

/// Maps a metric-construction failure (e.g. an invalid `namespace`
/// producing a malformed metric name) onto the `io::Result` `new` already
/// exposes, rather than assuming the composed name is always valid.
fn to_io_err(err: MetricsError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, err)
}

/// Collects the standard `process_*` metrics (CPU time, memory, file
/// descriptors, network I/O) from `/proc/self` on every scrape.
///
/// Each metric is minted once through a [`Factory`] at construction time;
/// [`ProcessCollector::collect`] only overwrites their values, never
/// re-registers them, so it is safe to register repeatedly across scrapes.
#[derive(Debug)]
pub struct ProcessCollector {
    page_size: u64,

    cpu_seconds_total: Counter,
    open_fds: Gauge,
    max_fds: Gauge,
    virtual_memory_bytes: Gauge,
    virtual_memory_max_bytes: Gauge,
    resident_memory_bytes: Gauge,
    network_receive_bytes_total: Counter,
    network_transmit_bytes_total: Counter,
}

impl ProcessCollector {
    /// Mints the `process_*` metrics against `factory`, optionally prefixed
    /// with `namespace`.
    pub fn new(factory: &Factory, namespace: Option<&str>) -> io::Result<Self> {
        let page_size = procfs::page_size();
        let prefix = match namespace {
            Some(n) => format!("{n}_"),
            None => String::new(),
        };
        let metric = |suffix: &str| format!("{prefix}{suffix}");

        let cpu_seconds_total = factory
            .counter(
                &metric("process_cpu_seconds_total"),
                "Total user and system CPU time spent in seconds.",
                CommonOpts::default(),
            )
            .map_err(to_io_err)?;
        let open_fds = factory
            .gauge(
                &metric("process_open_fds"),
                "Number of open file descriptors.",
                CommonOpts::default(),
            )
            .map_err(to_io_err)?;
        let max_fds = factory
            .gauge(
                &metric("process_max_fds"),
                "Maximum number of open file descriptors.",
                CommonOpts::default(),
            )
            .map_err(to_io_err)?;
        let virtual_memory_bytes = factory
            .gauge(
                &metric("process_virtual_memory_bytes"),
                "Virtual memory size in bytes.",
                CommonOpts::default(),
            )
            .map_err(to_io_err)?;
        let virtual_memory_max_bytes = factory
            .gauge(
                &metric("process_virtual_memory_max_bytes"),
                "Maximum amount of virtual memory available in bytes.",
                CommonOpts::default(),
            )
            .map_err(to_io_err)?;
        let resident_memory_bytes = factory
            .gauge(
                &metric("process_resident_memory_bytes"),
                "Resident memory size in bytes.",
                CommonOpts::default(),
            )
            .map_err(to_io_err)?;
        let network_receive_bytes_total = factory
            .counter(
                &metric("process_network_receive_bytes_total"),
                "Number of bytes received by the process over the network.",
                CommonOpts::default(),
            )
            .map_err(to_io_err)?;
        let network_transmit_bytes_total = factory
            .counter(
                &metric("process_network_transmit_bytes_total"),
                "Number of bytes sent by the process over the network.",
                CommonOpts::default(),
            )
            .map_err(to_io_err)?;

        Ok(Self {
            page_size,
            cpu_seconds_total,
            open_fds,
            max_fds,
            virtual_memory_bytes,
            virtual_memory_max_bytes,
            resident_memory_bytes,
            network_receive_bytes_total,
            network_transmit_bytes_total,
        })
    }

    fn refresh(&self, proc: &Process, stat: &Stat) -> Result<()> {
        let tps = procfs::ticks_per_second();
        self.cpu_seconds_total
            .inc_to(((stat.stime + stat.utime) / tps) as f64)?;

        if let Ok(n) = proc.fd_count() {
            self.open_fds.set(n as f64)?;
        }

        if let Ok(limits) = proc.limits() {
            let max_fds = resolve_limit(limits.max_open_files.soft_limit, limits.max_open_files.hard_limit);
            self.max_fds.set(max_fds as f64)?;

            let max_vm = resolve_limit(
                limits.max_address_space.soft_limit,
                limits.max_address_space.hard_limit,
            );
            self.virtual_memory_max_bytes.set(max_vm as f64)?;
        }

        self.virtual_memory_bytes.set(stat.vsize as f64)?;
        self.resident_memory_bytes
            .set((stat.rss * self.page_size) as f64)?;

        if let Ok(netstat) = Netstat::read(stat.pid) {
            if let Some(in_octets) = netstat.ip_ext.in_octets {
                self.network_receive_bytes_total.inc_to(in_octets)?;
            }
            if let Some(out_octets) = netstat.ip_ext.out_octets {
                self.network_transmit_bytes_total.inc_to(out_octets)?;
            }
        }

        Ok(())
    }
}

fn resolve_limit(soft: LimitValue, hard: LimitValue) -> u64 {
    match soft {
        LimitValue::Value(v) => v,
        LimitValue::Unlimited => match hard {
            LimitValue::Value(v) => v,
            LimitValue::Unlimited => 0,
        },
    }
}

impl Collector for ProcessCollector {
    fn collect(&self) -> Result<()> {
        let proc = match Process::myself() {
            Ok(proc) => proc,
            Err(_) => return Ok(()),
        };
        let stat = match proc.stat() {
            Ok(stat) => stat,
            Err(_) => return Ok(()),
        };
        self.refresh(&proc, &stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prom_instrument::registry::Registry;
    use std::sync::Arc;

    #[test]
    fn collector_refreshes_process_metrics() {
        let registry = Arc::new(Registry::new());
        let factory = Factory::new(registry.clone());
        let collector = Arc::new(ProcessCollector::new(&factory, None).unwrap());
        prom_instrument::collector::install(&registry, collector);

        let mut out = String::new();
        registry.collect_and_serialize(&mut out).unwrap();
        assert!(out.contains("process_virtual_memory_bytes"));
        assert!(out.contains("process_resident_memory_bytes"));
    }

    #[test]
    fn invalid_namespace_is_an_error_not_a_panic() {
        let registry = Arc::new(Registry::new());
        let factory = Factory::new(registry);
        assert!(ProcessCollector::new(&factory, Some("my-app")).is_err());
    }
}
