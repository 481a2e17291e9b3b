use crate::error::{Result, RttyError};
use crate::{MAX_TABLE_SIZE, MIN_TABLE_SIZE};
use std::f64::consts::PI;
use std::ops::Index;

/// Full-scale amplitude of a 16-bit sample. 8-bit output is derived from it.
pub const AMPLITUDE_MAX: f64 = 32767.0;

/// One cycle of a cosine, scaled by volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneTable {
    samples: Vec<i16>,
}

impl ToneTable {
    pub fn build(table_size: usize, volume: u8) -> Result<Self> {
        if !(MIN_TABLE_SIZE..=MAX_TABLE_SIZE).contains(&table_size) {
            return Err(RttyError::InvalidConfig(format!(
                "table size {} outside {}..={}",
                table_size, MIN_TABLE_SIZE, MAX_TABLE_SIZE
            )));
        }

        let mut samples = Vec::new();
        samples
            .try_reserve_exact(table_size)
            .map_err(|e| RttyError::Allocation(format!("tone table: {}", e)))?;

        let scale = f64::from(volume.min(100)) / 100.0 * AMPLITUDE_MAX;
        samples.extend((0..table_size).map(|i| {
            let angle = 2.0 * PI * i as f64 / table_size as f64;
            (scale * angle.cos()).round() as i16
        }));

        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }
}

impl Index<usize> for ToneTable {
    type Output = i16;

    fn index(&self, index: usize) -> &i16 {
        &self.samples[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_shape() {
        let table = ToneTable::build(8192, 100).unwrap();
        assert_eq!(table.len(), 8192);
        assert_eq!(table[0], 32767);
        assert_eq!(table[4096], -32767);
        assert_eq!(table[2048], 0);
        assert_eq!(table[6144], 0);
    }

    #[test]
    fn test_volume_scaling() {
        let half = ToneTable::build(1024, 50).unwrap();
        assert_eq!(half[0], 16384);
        assert_eq!(half[512], -16384);

        let silent = ToneTable::build(1024, 0).unwrap();
        assert!(silent.as_slice().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_build_is_pure() {
        let a = ToneTable::build(4096, 73).unwrap();
        let b = ToneTable::build(4096, 73).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, ToneTable::build(4096, 72).unwrap());
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(ToneTable::build(1, 100).is_err());
        assert!(ToneTable::build(MAX_TABLE_SIZE + 1, 100).is_err());
        assert_eq!(ToneTable::build(2, 100).unwrap().as_slice(), &[32767, -32767]);
    }
}
