use std::{cell::RefCell, rc::Rc};

/// A shared cell that always yields the most recently written value.
///
/// Operations that capture a `Latest` read the current value at the moment
/// they run, not the value that existed when they were created. Writing never
/// triggers anything else.
pub struct Latest<T> {
    value: Rc<RefCell<T>>,
}

impl<T> Clone for Latest<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

impl<T> Latest<T> {
    /// Creates a new cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
        }
    }

    /// Replaces the held value.
    pub fn set(&self, value: T) {
        *self.value.try_borrow_mut().expect("Latest::set borrow_mut") = value;
    }

    /// Reads the held value without cloning it.
    pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
        func(&self.value.try_borrow().expect("Latest::with borrow"))
    }
}

impl<T: Clone> Latest<T> {
    /// Returns a clone of the held value.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Latest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with(|value| f.debug_tuple("Latest").field(value).finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_read_latest_value() {
        let latest = Latest::new(1);
        let read = {
            let latest = latest.clone();
            move || latest.get()
        };

        assert_eq!(read(), 1);
        latest.set(2);
        assert_eq!(read(), 2, "Closure should observe the update");
    }
}
