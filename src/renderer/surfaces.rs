use crate::backend::{BackendError, GpuBackend};

/// Two render targets used in ping-pong, addressed by slot index.
///
/// Targets are allocated on first use and reallocated only when the working
/// size changes. `output` names the slot holding the last completed frame.
#[derive(Debug)]
pub struct RenderSurfaces<T> {
    slots: [Option<T>; 2],
    output: Option<usize>,
}

impl<T> Default for RenderSurfaces<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RenderSurfaces<T> {
    pub fn new() -> Self {
        Self {
            slots: [None, None],
            output: None,
        }
    }

    /// Make sure both slots hold a target of the given size.
    pub fn ensure<B>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<(), BackendError>
    where
        B: GpuBackend<Target = T>,
    {
        for index in 0..self.slots.len() {
            let stale = match &self.slots[index] {
                Some(target) => backend.target_size(target) != (width, height),
                None => true,
            };
            if !stale {
                continue;
            }

            // A resized slot no longer holds a valid output.
            if self.output == Some(index) {
                self.output = None;
            }
            self.slots[index] = None;
            self.slots[index] = Some(backend.create_target(width, height)?);
        }
        Ok(())
    }

    pub fn slot(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Slot a pass should write to, given the slot holding its input.
    /// The first pass of a frame (`front == None`) avoids the previous output.
    pub fn back_index(&self, front: Option<usize>) -> usize {
        match front.or(self.output) {
            Some(index) => 1 - index,
            None => 0,
        }
    }

    pub fn output(&self) -> Option<&T> {
        self.output.and_then(|index| self.slot(index))
    }

    pub fn output_index(&self) -> Option<usize> {
        self.output
    }

    pub(crate) fn commit(&mut self, index: usize) {
        self.output = Some(index);
    }

    /// Called before a pass writes to slot `index`. The previous output stops
    /// being current once its slot is overwritten.
    pub(crate) fn claim(&mut self, index: usize) {
        if self.output == Some(index) {
            self.output = None;
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}
