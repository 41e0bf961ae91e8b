//! Pending window mutations, drained by the event loop once per tick

use std::collections::BTreeSet;

/// One kind of pending mutation. The declaration order is the drain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum UpdateTask {
    /// Destroy and recreate the window for a new transparency mode.
    Recreate,
    /// Reapply WM_CLASS.
    Rename,
    /// Reapply the input shape.
    InputShape,
    Hide,
    Resize,
    Reposition,
    Render,
    Show,
    /// Start the flash clock.
    StartTimer,
}

#[derive(Debug, Default)]
pub(crate) struct UpdateTasks(BTreeSet<UpdateTask>);

impl UpdateTasks {
    pub fn insert(&mut self, task: UpdateTask) {
        self.0.insert(task);
    }

    pub fn remove(&mut self, task: UpdateTask) {
        self.0.remove(&task);
    }

    #[cfg(test)]
    pub fn contains(&self, task: UpdateTask) -> bool {
        self.0.contains(&task)
    }

    /// Clear `task`, reporting whether it was pending.
    pub fn take(&mut self, task: UpdateTask) -> bool {
        self.0.remove(&task)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Extend<UpdateTask> for UpdateTasks {
    fn extend<I: IntoIterator<Item = UpdateTask>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}
