//! Wiring several instances together.
//!
//! A [`Circuit`] is a fixed set of instances plus directed edges: every value
//! the source emits is supplied, in emission order, to the destination's
//! input queue. Edges may form a chain or a ring. The circuit is consumed by
//! [`Circuit::run_all`], so the wiring cannot change once instances start.

use crate::config::VmConfig;
use crate::error::{Result, VmError};
use crate::exec::Instance;
use crate::program::Program;
use tokio::task::JoinSet;

#[derive(Debug, Default)]
pub struct Circuit {
    nodes: Vec<Instance>,
    edges: Vec<(usize, usize)>,
    tap: Option<usize>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance; returns its index.
    pub fn add(&mut self, instance: Instance) -> usize {
        self.nodes.push(instance);
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn instance(&self, index: usize) -> Result<&Instance> {
        self.nodes.get(index).ok_or(VmError::UnknownInstance(index))
    }

    /// Forward everything `from` emits into `to`'s input queue.
    pub fn connect(&mut self, from: usize, to: usize) -> Result<()> {
        let sink = self.instance(to)?.input();
        // The subscription lives as long as the source's output stream.
        let _ = self.instance(from)?.subscribe_output(move |v, _| sink.push(v));
        self.edges.push((from, to));
        Ok(())
    }

    /// Queue values on an instance before it starts.
    pub fn seed(&self, index: usize, values: &[i64]) -> Result<()> {
        self.instance(index)?.supply_input(values);
        Ok(())
    }

    /// Choose the instance whose last output is the circuit's result.
    /// Defaults to the last instance added.
    pub fn set_tap(&mut self, index: usize) -> Result<()> {
        self.instance(index)?;
        self.tap = Some(index);
        Ok(())
    }

    /// Run every instance concurrently until all are terminal and return
    /// them in index order.
    ///
    /// A halt does not stop the peers. On the first fatal error the
    /// remaining instances are aborted and that error is returned.
    pub async fn run_to_completion(self) -> Result<Vec<Instance>> {
        let count = self.nodes.len();
        tracing::debug!(instances = count, edges = self.edges.len(), "circuit start");

        let mut set = JoinSet::new();
        for (index, mut instance) in self.nodes.into_iter().enumerate() {
            set.spawn(async move {
                let result = instance.run().await;
                (index, instance, result)
            });
        }

        let mut done: Vec<Option<Instance>> = (0..count).map(|_| None).collect();
        let mut first_err: Option<VmError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, instance, result)) => {
                    if let Err(e) = result {
                        tracing::warn!(
                            index,
                            label = instance.label(),
                            error = %e,
                            "circuit member failed"
                        );
                        if first_err.is_none() {
                            first_err = Some(e);
                            set.abort_all();
                        }
                    }
                    done[index] = Some(instance);
                }
                Err(join_err) if join_err.is_panic() => {
                    std::panic::resume_unwind(join_err.into_panic());
                }
                Err(_) => {
                    tracing::warn!("circuit member aborted");
                }
            }
        }

        if let Some(e) = first_err {
            return Err(e);
        }
        tracing::debug!(instances = count, "circuit complete");
        // slots are only left empty by abort_all, which implies first_err
        Ok(done.into_iter().flatten().collect())
    }

    /// Run to completion and return the tap instance's last output.
    pub async fn run_all(self) -> Result<i64> {
        if self.nodes.is_empty() {
            return Err(VmError::Config("circuit has no instances".into()));
        }
        let tap = self.tap.unwrap_or(self.nodes.len() - 1);
        let instances = self.run_to_completion().await?;
        instances[tap].last_output().ok_or(VmError::NoOutput(tap))
    }
}

// ── Amplifiers ───────────────────────────────────────────────────

/// How a bank of amplifiers is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// `i -> i + 1`; the last amplifier's output leaves the circuit.
    Chain,
    /// `i -> (i + 1) mod n`; the last amplifier also feeds the first.
    Ring,
}

/// One amplifier per phase setting, each seeded with its phase, the first
/// also seeded with the initial signal 0. The tap is the last amplifier.
pub fn amplifiers(
    program: &Program,
    phases: &[i64],
    topology: Topology,
    config: &VmConfig,
) -> Result<Circuit> {
    let mut circuit = Circuit::new();
    for (i, &phase) in phases.iter().enumerate() {
        let label = format!("amp-{}", (b'A' + (i % 26) as u8) as char);
        let idx = circuit.add(Instance::new(program, config.clone()).with_label(label));
        circuit.seed(idx, &[phase])?;
    }
    let n = circuit.len();
    for i in 0..n.saturating_sub(1) {
        circuit.connect(i, i + 1)?;
    }
    if topology == Topology::Ring && n > 0 {
        circuit.connect(n - 1, 0)?;
    }
    if n > 0 {
        circuit.seed(0, &[0])?;
    }
    Ok(circuit)
}

/// Final signal of one phase assignment.
pub async fn amplify(program: &Program, phases: &[i64], topology: Topology) -> Result<i64> {
    amplifiers(program, phases, topology, &VmConfig::default())?
        .run_all()
        .await
}

/// Best signal over every ordering of `phases`, with the ordering that
/// produced it.
pub async fn max_signal(
    program: &Program,
    phases: &[i64],
    topology: Topology,
) -> Result<(i64, Vec<i64>)> {
    let mut best: Option<(i64, Vec<i64>)> = None;
    for order in permutations(phases) {
        let signal = amplify(program, &order, topology).await?;
        if best.as_ref().map_or(true, |(b, _)| signal > *b) {
            best = Some((signal, order));
        }
    }
    best.ok_or_else(|| VmError::Config("no phase settings".into()))
}

/// Every ordering of `items` (Heap's algorithm).
pub fn permutations(items: &[i64]) -> Vec<Vec<i64>> {
    let mut a = items.to_vec();
    let n = a.len();
    if n == 0 {
        return Vec::new();
    }
    let mut out = vec![a.clone()];
    let mut c = vec![0usize; n];
    let mut i = 1;
    while i < n {
        if c[i] < i {
            if i % 2 == 0 {
                a.swap(0, i);
            } else {
                a.swap(c[i], i);
            }
            out.push(a.clone());
            c[i] += 1;
            i = 1;
        } else {
            c[i] = 0;
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportMode;
    use crate::exec::Status;
    use std::collections::BTreeSet;

    fn vm(text: &str) -> Instance {
        Instance::create(text, ReportMode::Output).unwrap()
    }

    // ── Wiring ──────────────────────────────────────────────────

    #[tokio::test]
    async fn chain_forwards_in_emission_order() {
        // emits 1, 2, 3
        let src = vm("104,1,104,2,104,3,99");
        // reads three values, echoes their sum
        let dst = vm("3,20,3,21,3,22,1,20,21,23,1,23,22,23,4,23,99");
        let mut c = Circuit::new();
        let a = c.add(src);
        let b = c.add(dst);
        c.connect(a, b).unwrap();
        assert_eq!(c.edges(), &[(0, 1)]);
        assert_eq!(c.run_all().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn run_to_completion_returns_instances_in_order() {
        let mut c = Circuit::new();
        let a = c.add(vm("3,0,4,0,99").with_label("first"));
        let b = c.add(vm("3,0,1001,0,1,0,4,0,99").with_label("second"));
        c.connect(a, b).unwrap();
        c.seed(a, &[41]).unwrap();
        let done = c.run_to_completion().await.unwrap();
        assert_eq!(done[0].label(), "first");
        assert_eq!(done[1].label(), "second");
        assert!(done.iter().all(|i| i.status() == Status::Halted));
        assert_eq!(done[1].last_output(), Some(42));
    }

    #[tokio::test]
    async fn tap_selects_the_reported_instance() {
        let mut c = Circuit::new();
        let a = c.add(vm("104,7,99"));
        c.add(vm("104,8,99"));
        c.set_tap(a).unwrap();
        assert_eq!(c.run_all().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn unknown_indices_are_rejected() {
        let mut c = Circuit::new();
        c.add(vm("99"));
        assert_eq!(c.connect(0, 3).unwrap_err(), VmError::UnknownInstance(3));
        assert_eq!(c.seed(5, &[1]).unwrap_err(), VmError::UnknownInstance(5));
        assert_eq!(c.set_tap(1).unwrap_err(), VmError::UnknownInstance(1));
    }

    #[tokio::test]
    async fn silent_tap_is_no_output() {
        let mut c = Circuit::new();
        c.add(vm("99"));
        assert_eq!(c.run_all().await.unwrap_err(), VmError::NoOutput(0));
    }

    #[tokio::test]
    async fn empty_circuit_is_a_config_error() {
        assert!(matches!(
            Circuit::new().run_all().await.unwrap_err(),
            VmError::Config(_)
        ));
    }

    #[tokio::test]
    async fn fatal_error_surfaces_and_aborts_blocked_peers() {
        let mut c = Circuit::new();
        // waits forever: nothing feeds it
        c.add(vm("3,0,99"));
        c.add(vm("42"));
        assert_eq!(
            c.run_all().await.unwrap_err(),
            VmError::IllegalOpcode { opcode: 42, ip: 0 }
        );
    }

    // ── Amplifiers ──────────────────────────────────────────────

    #[test]
    fn permutations_are_complete_and_distinct() {
        let all = permutations(&[0, 1, 2, 3, 4]);
        assert_eq!(all.len(), 120);
        let unique: BTreeSet<Vec<i64>> = all.iter().cloned().collect();
        assert_eq!(unique.len(), 120);
        assert_eq!(all[0], vec![0, 1, 2, 3, 4]);
        assert!(permutations(&[]).is_empty());
        assert_eq!(permutations(&[7]), vec![vec![7]]);
    }

    #[test]
    fn amplifier_wiring_shapes() {
        let p = Program::parse("99").unwrap();
        let chain = amplifiers(&p, &[1, 2, 3], Topology::Chain, &VmConfig::default()).unwrap();
        assert_eq!(chain.edges(), &[(0, 1), (1, 2)]);
        assert_eq!(chain.instance(0).unwrap().input().pending(), 2);
        assert_eq!(chain.instance(2).unwrap().label(), "amp-C");

        let ring = amplifiers(&p, &[1, 2, 3], Topology::Ring, &VmConfig::default()).unwrap();
        assert_eq!(ring.edges(), &[(0, 1), (1, 2), (2, 0)]);
    }
}
