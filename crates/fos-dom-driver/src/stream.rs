//! Push Streams
//!
//! Single-threaded push streams. A stream built from a [`Producer`] starts
//! it when the first listener subscribes and stops it synchronously when the
//! last [`Subscription`] is dropped. Subjects have no producer and are fed
//! with [`Stream::emit`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::DriverError;

/// Errors travel by shared handle so operators can forward them
pub type StreamError = Rc<DriverError>;

/// Source of values for a [`Stream`]
pub trait Producer<T> {
    /// Called when the first listener subscribes
    fn start(&mut self, sink: Sink<T>);

    /// Called when the last listener unsubscribes
    fn stop(&mut self);
}

/// Callbacks attached to a stream
pub struct Listener<T> {
    next: Box<dyn Fn(&T)>,
    error: Box<dyn Fn(&StreamError)>,
    complete: Box<dyn Fn()>,
}

impl<T> Listener<T> {
    pub fn new(next: impl Fn(&T) + 'static) -> Self {
        Self {
            next: Box::new(next),
            error: Box::new(|_| {}),
            complete: Box::new(|| {}),
        }
    }

    pub fn on_error(mut self, error: impl Fn(&StreamError) + 'static) -> Self {
        self.error = Box::new(error);
        self
    }

    pub fn on_complete(mut self, complete: impl Fn() + 'static) -> Self {
        self.complete = Box::new(complete);
        self
    }
}

struct Inner<T> {
    this: Weak<Inner<T>>,
    listeners: RefCell<Vec<(u64, Rc<Listener<T>>)>>,
    next_id: Cell<u64>,
    /// Checked out while `start`/`stop` run
    producer: RefCell<Option<Box<dyn Producer<T>>>>,
    has_producer: bool,
    running: Cell<bool>,
    stop_requested: Cell<bool>,
    keep_memory: bool,
    memory: RefCell<Option<T>>,
}

impl<T: Clone + 'static> Inner<T> {
    fn is_listening(&self, id: u64) -> bool {
        self.listeners.borrow().iter().any(|(i, _)| *i == id)
    }

    fn snapshot(&self) -> Vec<(u64, Rc<Listener<T>>)> {
        self.listeners.borrow().clone()
    }

    fn add(&self, listener: Listener<T>) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let listener = Rc::new(listener);
        self.listeners.borrow_mut().push((id, listener.clone()));

        let remembered = self.memory.borrow().clone();
        if let Some(value) = remembered {
            (listener.next)(&value);
        }

        if self.has_producer && !self.running.get() && self.is_listening(id) {
            self.start();
        }
        id
    }

    fn remove(&self, id: u64) {
        let now_empty = {
            let mut listeners = self.listeners.borrow_mut();
            let before = listeners.len();
            listeners.retain(|(i, _)| *i != id);
            before != listeners.len() && listeners.is_empty()
        };
        if now_empty {
            self.stop();
        }
    }

    fn start(&self) {
        let Some(mut producer) = self.producer.borrow_mut().take() else {
            return;
        };
        self.running.set(true);
        self.stop_requested.set(false);

        producer.start(Sink {
            inner: self.this.clone(),
        });

        // The last listener may have left while the producer was starting
        if self.stop_requested.replace(false) {
            producer.stop();
            self.running.set(false);
            self.memory.take();
        }
        *self.producer.borrow_mut() = Some(producer);
    }

    fn stop(&self) {
        if !self.running.get() {
            return;
        }
        let taken = self.producer.borrow_mut().take();
        match taken {
            Some(mut producer) => {
                self.running.set(false);
                producer.stop();
                *self.producer.borrow_mut() = Some(producer);
                self.memory.take();
            }
            None => self.stop_requested.set(true),
        }
    }

    fn emit(&self, value: T) {
        if self.keep_memory {
            *self.memory.borrow_mut() = Some(value.clone());
        }
        for (id, listener) in self.snapshot() {
            if self.is_listening(id) {
                (listener.next)(&value);
            }
        }
    }

    fn error(&self, error: StreamError) {
        for (id, listener) in self.snapshot() {
            if self.is_listening(id) {
                (listener.error)(&error);
            }
        }
    }

    fn complete(&self) {
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for (_, listener) in listeners {
            (listener.complete)();
        }
        self.stop();
    }
}

/// Write end handed to a [`Producer`]
pub struct Sink<T> {
    inner: Weak<Inner<T>>,
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Sink<T> {
    pub fn next(&self, value: T) {
        if let Some(inner) = self.inner.upgrade() {
            inner.emit(value);
        }
    }

    pub fn error(&self, error: StreamError) {
        if let Some(inner) = self.inner.upgrade() {
            inner.error(error);
        }
    }

    pub fn complete(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.complete();
        }
    }
}

/// Handle to an active listener; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Unsubscribe now
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the listener attached for the lifetime of the stream
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Push-based stream of `T`
pub struct Stream<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("listeners", &self.inner.listeners.borrow().len())
            .field("running", &self.inner.running.get())
            .field("remembers", &self.inner.keep_memory)
            .finish()
    }
}

impl<T: Clone + 'static> Stream<T> {
    fn build(producer: Option<Box<dyn Producer<T>>>, keep_memory: bool) -> Self {
        let has_producer = producer.is_some();
        Self {
            inner: Rc::new_cyclic(|this| Inner {
                this: this.clone(),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                producer: RefCell::new(producer),
                has_producer,
                running: Cell::new(false),
                stop_requested: Cell::new(false),
                keep_memory,
                memory: RefCell::new(None),
            }),
        }
    }

    /// Stream driven by `producer`
    pub fn create(producer: impl Producer<T> + 'static) -> Self {
        Self::build(Some(Box::new(producer)), false)
    }

    /// Stream fed by hand with [`Stream::emit`]
    pub fn subject() -> Self {
        Self::build(None, false)
    }

    /// Subject that replays its latest value to new listeners
    pub fn memory_subject() -> Self {
        Self::build(None, true)
    }

    /// Emit `values` to each new listener, then complete
    pub fn of(values: Vec<T>) -> Self {
        Self::create(Of { values })
    }

    /// Completes as soon as it is subscribed to
    pub fn empty() -> Self {
        Self::of(Vec::new())
    }

    pub fn emit(&self, value: T) {
        self.inner.emit(value);
    }

    pub fn emit_error(&self, error: DriverError) {
        self.inner.error(Rc::new(error));
    }

    /// Complete every listener and detach them
    pub fn complete(&self) {
        self.inner.complete();
    }

    pub fn subscribe(&self, next: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe_with(Listener::new(next))
    }

    pub fn subscribe_with(&self, listener: Listener<T>) -> Subscription {
        let id = self.inner.add(listener);
        let inner = self.inner.clone();
        Subscription {
            cancel: Some(Box::new(move || inner.remove(id))),
        }
    }

    /// Write end feeding this stream's listeners directly
    pub fn sink(&self) -> Sink<T> {
        Sink {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Latest remembered value
    pub fn value(&self) -> Option<T> {
        self.inner.memory.borrow().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// True while the producer runs
    pub fn is_active(&self) -> bool {
        self.inner.running.get()
    }

    pub fn map<U: Clone + 'static>(&self, f: impl Fn(&T) -> U + 'static) -> Stream<U> {
        Stream::create(Operator::new(self.clone(), move |value, sink: &Sink<U>| {
            sink.next(f(value))
        }))
    }

    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Stream<T> {
        Stream::create(Operator::new(self.clone(), move |value: &T, sink: &Sink<T>| {
            if predicate(value) {
                sink.next(value.clone());
            }
        }))
    }

    /// Replay the latest value to late listeners while active
    pub fn remember(&self) -> Stream<T> {
        let operator = Operator::new(self.clone(), |value: &T, sink: &Sink<T>| {
            sink.next(value.clone())
        });
        Stream::build(Some(Box::new(operator)), true)
    }

    /// Interleave several streams; completes once all of them did
    pub fn merge(streams: &[Stream<T>]) -> Stream<T> {
        Stream::create(Merge {
            sources: streams.to_vec(),
            subscriptions: Vec::new(),
        })
    }
}

struct Of<T> {
    values: Vec<T>,
}

impl<T: Clone + 'static> Producer<T> for Of<T> {
    fn start(&mut self, sink: Sink<T>) {
        for value in self.values.iter().cloned() {
            sink.next(value);
        }
        sink.complete();
    }

    fn stop(&mut self) {}
}

type Step<T, U> = Rc<dyn Fn(&T, &Sink<U>)>;

/// Subscribes upstream while running and feeds each value through `step`
struct Operator<T, U> {
    source: Stream<T>,
    step: Step<T, U>,
    subscription: Option<Subscription>,
}

impl<T, U> Operator<T, U> {
    fn new(source: Stream<T>, step: impl Fn(&T, &Sink<U>) + 'static) -> Self {
        Self {
            source,
            step: Rc::new(step),
            subscription: None,
        }
    }
}

impl<T: Clone + 'static, U: Clone + 'static> Producer<U> for Operator<T, U> {
    fn start(&mut self, sink: Sink<U>) {
        let step = self.step.clone();
        let on_error = sink.clone();
        let on_complete = sink.clone();
        let listener = Listener::new(move |value| step(value, &sink))
            .on_error(move |err| on_error.error(err.clone()))
            .on_complete(move || on_complete.complete());
        self.subscription = Some(self.source.subscribe_with(listener));
    }

    fn stop(&mut self) {
        drop(self.subscription.take());
    }
}

struct Merge<T> {
    sources: Vec<Stream<T>>,
    subscriptions: Vec<Subscription>,
}

impl<T: Clone + 'static> Producer<T> for Merge<T> {
    fn start(&mut self, sink: Sink<T>) {
        let remaining = Rc::new(Cell::new(self.sources.len()));
        for source in &self.sources {
            let next = sink.clone();
            let on_error = sink.clone();
            let on_complete = sink.clone();
            let remaining = remaining.clone();
            let listener = Listener::new(move |value: &T| next.next(value.clone()))
                .on_error(move |err| on_error.error(err.clone()))
                .on_complete(move || {
                    remaining.set(remaining.get().saturating_sub(1));
                    if remaining.get() == 0 {
                        on_complete.complete();
                    }
                });
            self.subscriptions.push(source.subscribe_with(listener));
        }
    }

    fn stop(&mut self) {
        self.subscriptions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<T: Clone + 'static>(stream: &Stream<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let sub = stream.subscribe(move |v: &T| log.borrow_mut().push(v.clone()));
        (seen, sub)
    }

    struct Counting {
        starts: Rc<Cell<u32>>,
        stops: Rc<Cell<u32>>,
        sink: Option<Sink<u32>>,
    }

    impl Producer<u32> for Counting {
        fn start(&mut self, sink: Sink<u32>) {
            self.starts.set(self.starts.get() + 1);
            self.sink = Some(sink);
        }

        fn stop(&mut self) {
            self.stops.set(self.stops.get() + 1);
            self.sink = None;
        }
    }

    #[test]
    fn test_producer_lifecycle() {
        let starts = Rc::new(Cell::new(0));
        let stops = Rc::new(Cell::new(0));
        let stream = Stream::create(Counting {
            starts: starts.clone(),
            stops: stops.clone(),
            sink: None,
        });

        let a = stream.subscribe(|_| {});
        let b = stream.subscribe(|_| {});
        assert_eq!(starts.get(), 1);
        assert!(stream.is_active());

        drop(a);
        assert_eq!(stops.get(), 0);
        b.unsubscribe();
        assert_eq!(stops.get(), 1);
        assert!(!stream.is_active());
    }

    #[test]
    fn test_map_filter() {
        let subject = Stream::subject();
        let doubled_even = subject.filter(|v: &u32| v % 2 == 0).map(|v| v * 10);
        let (seen, _sub) = collect(&doubled_even);

        for v in 1..=4 {
            subject.emit(v);
        }
        assert_eq!(*seen.borrow(), vec![20, 40]);
    }

    #[test]
    fn test_upstream_released_with_last_listener() {
        let subject: Stream<u32> = Stream::subject();
        let mapped = subject.map(|v| v + 1);

        let sub = mapped.subscribe(|_| {});
        assert_eq!(subject.listener_count(), 1);
        drop(sub);
        assert_eq!(subject.listener_count(), 0);
    }

    #[test]
    fn test_memory_subject_replays_latest() {
        let subject = Stream::memory_subject();
        subject.emit(1);
        subject.emit(2);

        let (seen, _sub) = collect(&subject);
        assert_eq!(*seen.borrow(), vec![2]);
        assert_eq!(subject.value(), Some(2));
    }

    #[test]
    fn test_remember_forgets_when_stopped() {
        let subject = Stream::subject();
        let remembered = subject.remember();

        let (first, sub) = collect(&remembered);
        subject.emit(5);
        let (second, _sub2) = collect(&remembered);
        assert_eq!(*first.borrow(), vec![5]);
        assert_eq!(*second.borrow(), vec![5]);

        drop(sub);
        drop(_sub2);
        assert_eq!(remembered.value(), None);
    }

    #[test]
    fn test_of_and_merge() {
        let a = Stream::of(vec![1, 2]);
        let b = Stream::of(vec![3]);
        let merged = Stream::merge(&[a, b]);

        let completed = Rc::new(Cell::new(false));
        let done = completed.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let _sub = merged.subscribe_with(
            Listener::new(move |v: &i32| log.borrow_mut().push(*v))
                .on_complete(move || done.set(true)),
        );

        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert!(completed.get());
    }

    #[test]
    fn test_unsubscribe_during_emit() {
        let subject = Stream::subject();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let clear = slot.clone();
        let _first = subject.subscribe(move |_: &u32| {
            clear.borrow_mut().take();
        });
        let log = seen.clone();
        *slot.borrow_mut() = Some(subject.subscribe(move |v: &u32| log.borrow_mut().push(*v)));

        subject.emit(1);
        subject.emit(2);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_errors_are_forwarded() {
        let subject: Stream<u32> = Stream::subject();
        let mapped = subject.map(|v| *v);
        let errors = Rc::new(Cell::new(0));
        let count = errors.clone();
        let _sub = mapped.subscribe_with(
            Listener::new(|_| {}).on_error(move |_| count.set(count.get() + 1)),
        );

        subject.emit_error(DriverError::EmptySelector);
        assert_eq!(errors.get(), 1);
    }
}
