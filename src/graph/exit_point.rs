use std::cell::RefCell;

/// A named subject exposing the last value `send` wrote and fanning it out to every
/// attached observer, synchronously, in attachment order.
///
/// Observers are plain closures rather than a trait-object `Observer<T>` hierarchy: the
/// set of port types is closed (mono block, transform, id, command, weak service
/// reference) and a closure capturing the downstream module's `Rc<RefCell<_>>` is the
/// idiomatic equivalent of "notify this entry point" without an extra indirection layer.
pub struct ExitPoint<T: Clone> {
    id: &'static str,
    last: RefCell<Option<T>>,
    observers: RefCell<Vec<Box<dyn Fn(T)>>>,
}

impl<T: Clone> ExitPoint<T> {
    pub fn new(id: &'static str) -> Self {
        ExitPoint { id, last: RefCell::new(None), observers: RefCell::new(Vec::new()) }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn attach(&self, observer: Box<dyn Fn(T)>) {
        self.observers.borrow_mut().push(observer);
    }

    pub fn detach_all(&self) {
        self.observers.borrow_mut().clear();
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    pub fn send(&self, value: T) {
        *self.last.borrow_mut() = Some(value.clone());
        for observer in self.observers.borrow().iter() {
            observer(value.clone());
        }
    }

    pub fn last(&self) -> Option<T>
    where
        T: Clone,
    {
        self.last.borrow().clone()
    }
}
