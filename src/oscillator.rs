use crate::buffer::SampleSink;
use crate::error::Result;
use crate::tone::ToneTable;

/// Table-lookup oscillator with a rational phase step.
///
/// Each output sample advances the phase by `frequency * table_size /
/// sample_rate` table entries. The integer part is added directly and the
/// remainder is spread with a Bresenham error term, so long runs never drift.
/// Phase and error belong to the oscillator, not to a single `render` call:
/// switching between mark and space continues from the same phase.
pub struct Oscillator {
    table: ToneTable,
    sample_rate: u32,
    phase: usize,
    error: i64,
}

impl Oscillator {
    pub fn new(table: ToneTable, sample_rate: u32) -> Self {
        Self {
            table,
            sample_rate,
            phase: 0,
            error: i64::from(sample_rate / 2),
        }
    }

    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn table(&self) -> &ToneTable {
        &self.table
    }

    pub fn samples_for(&self, duration_ms: u32) -> u64 {
        u64::from(duration_ms) * u64::from(self.sample_rate) / 1000
    }

    pub fn render<S>(&mut self, frequency: u32, duration_ms: u32, out: &mut S) -> Result<()>
    where
        S: SampleSink + ?Sized,
    {
        if duration_ms == 0 {
            return Ok(());
        }

        let table_size = self.table.len();
        let rate = i64::from(self.sample_rate);
        let scaled = u64::from(frequency) * table_size as u64;
        let step_integer = (scaled / u64::from(self.sample_rate)) as usize;
        let step_fraction = (scaled % u64::from(self.sample_rate)) as i64;

        for _ in 0..self.samples_for(duration_ms) {
            out.push_sample(self.table[self.phase])?;

            self.phase += step_integer;
            if self.error < 0 {
                self.error += rate;
                self.phase += 1;
            }
            self.phase %= table_size;
            self.error -= step_fraction;
        }

        Ok(())
    }
}
