//! Two synthetic streams in lockstep: a muon stream drives the clock
//! while a trigger stream is gated against it, and a singles selection
//! vetoes triggers that follow an energetic muon too closely.
//!
//! Run with `RUST_LOG=debug` to watch the synchronization protocol.

use lockstep::prelude::*;
use std::path::PathBuf;

const MUONS: i32 = 1;
const TRIGGERS: i32 = 2;

#[derive(Clone, Copy, Debug)]
struct Hit {
    t: Time,
    charge_pe: f32,
}

impl Timestamped for Hit {
    fn time(&self) -> Time {
        self.t
    }
}

/// Deterministic synthetic stream: roughly periodic hits with jittered
/// spacing and charge.
struct SynthFetch {
    period_us: u64,
    count: u64,
    state: u64,
}

impl SynthFetch {
    fn new(period_us: u64, count: u64, seed: u64) -> Self {
        Self {
            period_us,
            count,
            state: seed,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 33
    }
}

impl Fetch for SynthFetch {
    type Record = Hit;

    fn load(&mut self, _inputs: &[PathBuf]) -> Result<()> {
        Ok(())
    }

    fn fetch(&mut self, entry: u64) -> Result<Option<Hit>> {
        if entry >= self.count {
            return Ok(None);
        }
        let jitter = self.next_u64() % (self.period_us / 2);
        let charge = 500.0 + (self.next_u64() % 5000) as f32;
        Ok(Some(Hit {
            t: Time::from_micros(entry * self.period_us + jitter),
            charge_pe: charge,
        }))
    }
}

type HitReader = TimeSyncReader<SynthFetch>;

/// Accepts a trigger unless an energetic muon fired within the veto
/// window just before it.
struct SinglesSel {
    muons: Option<Handle<HitReader>>,
    triggers: Option<Handle<HitReader>>,
    veto_window_us: i64,
    muon_min_pe: f32,
    accepted: u64,
    vetoed: u64,
}

impl SinglesSel {
    fn new(veto_window_us: i64, muon_min_pe: f32) -> Self {
        Self {
            muons: None,
            triggers: None,
            veto_window_us,
            muon_min_pe,
            accepted: 0,
            vetoed: 0,
        }
    }
}

impl Node for SinglesSel {
    fn connect(&mut self, pipe: &Pipeline) -> Result<()> {
        self.muons = Some(pipe.alg_tagged::<HitReader>(MUONS)?);
        self.triggers = Some(pipe.alg_tagged::<HitReader>(TRIGGERS)?);
        Ok(())
    }
}

impl Algorithm for SinglesSel {
    fn execute(&mut self, _pipe: &Pipeline) -> Result<Status> {
        let triggers = self.triggers.as_ref().unwrap().clone();
        let muons = self.muons.as_ref().unwrap().clone();

        let triggers = triggers.borrow();
        if !triggers.ready() {
            return Ok(Status::Continue);
        }
        let trig = triggers.data();

        let muons = muons.borrow();
        let muon = muons.data();
        let dt = trig.t.diff_us(muon.t);
        if muon.charge_pe > self.muon_min_pe && (0..self.veto_window_us).contains(&dt) {
            self.vetoed += 1;
            return Ok(Status::SkipToNext);
        }
        self.accepted += 1;
        Ok(Status::Continue)
    }

    fn finalize(&mut self, _pipe: &Pipeline) -> Result<()> {
        tracing::info!(
            accepted = self.accepted,
            vetoed = self.vetoed,
            "singles selection done"
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut pipe = Pipeline::new();
    pipe.add_tool(Clock::new());

    pipe.add_alg_tagged(
        MUONS,
        TimeSyncReader::new(SynthFetch::new(1_000, 20_000, 7), ClockMode::Writer)
            .report_interval(5_000),
    );
    pipe.add_alg_tagged(
        TRIGGERS,
        TimeSyncReader::new(SynthFetch::new(300, 60_000, 42), ClockMode::Reader),
    );
    pipe.add_alg(PrefetchLooper::<HitReader>::tagged(TRIGGERS));
    pipe.add_alg(SinglesSel::new(1_000, 3_000.0));

    pipe.run(vec![])?;
    Ok(())
}
