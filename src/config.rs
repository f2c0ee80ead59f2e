//! Host-embedding configuration. A plain struct with a `Default` impl: the
//! teacher's stack carries no config-file crate for anything like this, so
//! this stays a struct rather than reaching for `serde` machinery nothing
//! else in the pack grounds.

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub instruction_lanes: usize,
    pub num_registers: usize,
    pub alu_period: u64,
    pub bru_period: u64,
    pub mlu_period: u64,
    pub dvu_period: u64,
    pub lsu_period: u64,
    pub regfile_period: u64,
    pub use_regfile_forwarding: bool,
    pub connection_latency: u64,
    pub buffer_size: usize,
    pub num_memory_banks: usize,
    pub start_time: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instruction_lanes: 2,
            num_registers: 32,
            alu_period: 1,
            bru_period: 1,
            mlu_period: 1,
            dvu_period: 1,
            lsu_period: 1,
            regfile_period: 1,
            use_regfile_forwarding: false,
            connection_latency: 1,
            buffer_size: 8,
            num_memory_banks: 8,
            start_time: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_standard_32_register_core() {
        let cfg = Config::default();
        assert_eq!(cfg.num_registers, 32);
        assert!(!cfg.use_regfile_forwarding);
    }
}
