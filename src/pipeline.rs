//! Multi-stage ticking component with per-stage transform and stall
//! predicates. `tick()` advances strictly right-to-left within one cycle so
//! a stage's effects never leak into a stage that has not yet been visited
//! this cycle.

pub struct PipelineStage<T> {
    slot: Option<T>,
    transform: Box<dyn FnMut(T) -> T>,
    stall_pred: Box<dyn Fn(&T) -> bool>,
}

impl<T> PipelineStage<T> {
    fn identity() -> Self {
        Self {
            slot: None,
            transform: Box::new(|d| d),
            stall_pred: Box::new(|_| false),
        }
    }
}

pub struct Pipeline<T> {
    pub name: String,
    stages: Vec<PipelineStage<T>>,
    pub total_processed: u64,
    pub total_stalls: u64,
}

impl<T> Pipeline<T> {
    pub fn new(name: impl Into<String>, num_stages: usize) -> Self {
        assert!(num_stages > 0);
        let stages = (0..num_stages).map(|_| PipelineStage::identity()).collect();
        Self {
            name: name.into(),
            stages,
            total_processed: 0,
            total_stalls: 0,
        }
    }

    pub fn set_stage_transform(&mut self, i: usize, f: impl FnMut(T) -> T + 'static) {
        self.stages[i].transform = Box::new(f);
    }

    pub fn set_stage_stall_predicate(&mut self, i: usize, f: impl Fn(&T) -> bool + 'static) {
        self.stages[i].stall_pred = Box::new(f);
    }

    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn is_full(&self) -> bool {
        self.stages[0].slot.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(|s| s.slot.is_none())
    }

    pub fn occupancy(&self) -> usize {
        self.stages.iter().filter(|s| s.slot.is_some()).count()
    }

    /// Accept a new item into stage 0, applying stage 0's transform. Fails
    /// if stage 0 is already occupied.
    pub fn offer(&mut self, input: T) -> Result<(), T> {
        if self.stages[0].slot.is_some() {
            return Err(input);
        }
        let data = (self.stages[0].transform)(input);
        self.stages[0].slot = Some(data);
        Ok(())
    }

    /// Advance the pipeline by one cycle. `output_available` indicates the
    /// output port has room to receive the final stage's contents this
    /// cycle; if `false`, the final stage's item is retained and blocks the
    /// stage behind it, same as any other stall.
    pub fn tick(&mut self, output_available: bool) -> Option<T> {
        let n = self.stages.len();

        // In-place progress for stages whose own data says "not done yet"
        // (e.g. a multi-cycle iterative computation parked in one stage).
        for i in 0..n {
            let needs_progress = self
                .stages[i]
                .slot
                .as_ref()
                .map(|d| (self.stages[i].stall_pred)(d))
                .unwrap_or(false);
            if needs_progress {
                let data = self.stages[i].slot.take().unwrap();
                let data = (self.stages[i].transform)(data);
                self.stages[i].slot = Some(data);
            }
        }

        let output = if output_available {
            self.stages[n - 1].slot.take()
        } else {
            None
        };
        if output.is_some() {
            self.total_processed += 1;
        } else if self.stages[n - 1].slot.is_some() {
            self.total_stalls += 1;
        }

        for i in (1..n).rev() {
            if self.stages[i].slot.is_some() {
                continue;
            }
            let stall = match self.stages[i - 1].slot.as_ref() {
                Some(candidate) => (self.stages[i - 1].stall_pred)(candidate),
                None => continue,
            };
            if stall {
                self.total_stalls += 1;
                continue;
            }
            let data = self.stages[i - 1].slot.take().unwrap();
            let data = (self.stages[i].transform)(data);
            self.stages[i].slot = Some(data);
        }

        output
    }

    pub fn reset(&mut self) {
        for s in &mut self.stages {
            s.slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_packet_flows_through_without_skipping_a_stage() {
        let mut p: Pipeline<u32> = Pipeline::new("p", 3);
        p.set_stage_transform(1, |v| v + 1);
        p.set_stage_transform(2, |v| v * 10);

        p.offer(5).unwrap();
        assert_eq!(p.tick(true), None); // stage0 -> stage1 this cycle
        assert_eq!(p.occupancy(), 1);
        assert_eq!(p.tick(true), None); // stage1 -> stage2
        assert_eq!(p.occupancy(), 1);
        assert_eq!(p.tick(true), Some(60)); // (5+1)*10 sampled to output
        assert!(p.is_empty());
    }

    #[test]
    fn stall_predicate_holds_a_packet_in_place() {
        let mut p: Pipeline<u32> = Pipeline::new("p", 2);
        p.set_stage_stall_predicate(0, |v| *v < 3);
        p.set_stage_transform(0, |v| v + 1);

        p.offer(0).unwrap();
        assert_eq!(p.tick(true), None);
        assert_eq!(p.tick(true), None);
        // after two in-place progress ticks value is 2, still < 3, stalls again
        assert_eq!(p.tick(true), None);
        // now value is 3, stall predicate false, moves to stage 1
        assert_eq!(p.tick(true), Some(3));
    }

    #[test]
    fn backpressure_on_output_blocks_the_whole_pipeline() {
        let mut p: Pipeline<u32> = Pipeline::new("p", 2);
        p.offer(1).unwrap();
        p.tick(true);
        p.offer(2).unwrap();
        assert!(p.offer(3).is_err());
        assert_eq!(p.tick(false), None);
        assert_eq!(p.occupancy(), 2);
    }
}
