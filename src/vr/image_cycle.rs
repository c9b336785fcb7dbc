use super::{XrError, XrResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleStage {
    Released,
    Acquired(u32),
    Waited(u32),
}

/// Tracks the acquire → wait → release protocol of one swapchain.
///
/// At most one image is outstanding at a time and images are handed out round-robin.
#[derive(Debug, Clone)]
pub struct ImageCycle {
    image_count: u32,
    next_image: u32,
    stage: CycleStage,
}

impl ImageCycle {
    pub fn new(image_count: u32) -> Self {
        Self {
            image_count,
            next_image: 0,
            stage: CycleStage::Released,
        }
    }

    pub fn acquire(&mut self) -> XrResult<u32> {
        if self.image_count == 0 {
            return Err(XrError::call_order("acquire on a swapchain without images"));
        }
        match self.stage {
            CycleStage::Released => {
                let index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count;
                self.stage = CycleStage::Acquired(index);
                Ok(index)
            }
            CycleStage::Acquired(index) | CycleStage::Waited(index) => Err(XrError::call_order(
                format!("image {index} acquired again before release"),
            )),
        }
    }

    pub fn wait(&mut self) -> XrResult<u32> {
        match self.stage {
            CycleStage::Acquired(index) => {
                self.stage = CycleStage::Waited(index);
                Ok(index)
            }
            CycleStage::Waited(index) => Err(XrError::call_order(format!(
                "image {index} waited twice"
            ))),
            CycleStage::Released => Err(XrError::call_order("wait without an acquired image")),
        }
    }

    pub fn release(&mut self) -> XrResult<u32> {
        match self.stage {
            CycleStage::Waited(index) => {
                self.stage = CycleStage::Released;
                Ok(index)
            }
            CycleStage::Acquired(index) => Err(XrError::call_order(format!(
                "image {index} released before wait"
            ))),
            CycleStage::Released => Err(XrError::call_order("release without an acquired image")),
        }
    }

    pub fn outstanding(&self) -> Option<u32> {
        match self.stage {
            CycleStage::Released => None,
            CycleStage::Acquired(index) | CycleStage::Waited(index) => Some(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cycle_hands_out_images_round_robin() {
        let mut cycle = ImageCycle::new(2);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(cycle.acquire().expect("acquire"));
            cycle.wait().expect("wait");
            cycle.release().expect("release");
        }
        assert_eq!(seen, vec![0, 1, 0]);
        assert_eq!(cycle.outstanding(), None);
    }

    #[test]
    fn release_before_wait_is_rejected() {
        let mut cycle = ImageCycle::new(3);
        cycle.acquire().expect("acquire");
        assert!(matches!(cycle.release(), Err(XrError::CallOrder(_))));
        assert_eq!(cycle.outstanding(), Some(0));
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Acquire,
        Wait,
        Release,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![Just(Step::Acquire), Just(Step::Wait), Just(Step::Release)]
    }

    proptest! {
        #[test]
        fn never_two_images_outstanding(steps in proptest::collection::vec(step(), 0..64)) {
            let mut cycle = ImageCycle::new(3);
            let mut outstanding = 0u32;
            for step in steps {
                match step {
                    Step::Acquire => {
                        let accepted = cycle.acquire().is_ok();
                        prop_assert_eq!(accepted, outstanding == 0);
                        if accepted {
                            outstanding += 1;
                        }
                    }
                    Step::Wait => {
                        let _ = cycle.wait();
                    }
                    Step::Release => {
                        if cycle.release().is_ok() {
                            outstanding -= 1;
                        }
                    }
                }
                prop_assert!(outstanding <= 1);
                prop_assert_eq!(cycle.outstanding().is_some(), outstanding == 1);
            }
        }
    }
}
