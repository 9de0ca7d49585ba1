//! Runners implement threading strategies for the bundled transport.
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use log::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs each job inline on the calling thread.
pub struct SimpleRunner;

impl SimpleRunner {
    pub fn run<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        f();
    }
}

/// Spawns a new thread per job; threads are joined on drop.
pub struct ThreadRunner {
    threads: Vec<Option<thread::JoinHandle<()>>>,
}

impl ThreadRunner {
    pub fn new() -> Self {
        Self { threads: vec![] }
    }

    pub fn run<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Reap finished handles so a long-running server does not grow a
        // handle per job.
        self.threads
            .retain(|t| t.as_ref().map_or(false, |t| !t.is_finished()));
        self.threads.push(Some(thread::spawn(f)));
    }
}

impl Default for ThreadRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadRunner {
    fn drop(&mut self) {
        for thread in &mut self.threads {
            if let Some(thread) = thread.take() {
                if let Err(e) = thread.join() {
                    error!("error joining thread: {:?}", e);
                }
            }
        }
    }
}

enum Message {
    NewJob(Job),
    Terminate,
}

/// A fixed pool of workers pulling jobs off a shared channel.
pub struct ThreadPoolRunner {
    workers: Vec<Option<thread::JoinHandle<()>>>,
    sender: mpsc::Sender<Message>,
}

impl ThreadPoolRunner {
    pub fn new(pool_size: usize) -> Self {
        assert!(pool_size > 0);
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..pool_size)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                Some(thread::spawn(move || loop {
                    let message = receiver.lock().unwrap().recv().unwrap();
                    match message {
                        Message::NewJob(job) => job(),
                        Message::Terminate => break,
                    }
                }))
            })
            .collect();
        Self { workers, sender }
    }

    pub fn run<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Message::NewJob(Box::new(f))).is_err() {
            error!("thread pool error: failed to send job message");
        }
    }
}

impl Drop for ThreadPoolRunner {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.sender.send(Message::Terminate);
        }
        for worker in &mut self.workers {
            if let Some(thread) = worker.take() {
                if let Err(e) = thread.join() {
                    error!("error joining worker: {:?}", e);
                }
            }
        }
    }
}

pub enum Runner {
    Simple(SimpleRunner),
    Thread(ThreadRunner),
    ThreadPool(ThreadPoolRunner),
}

impl Runner {
    /// Create a new runner using the specified number of threads.
    /// 0 is infinite, a new thread will be created for each job.
    /// 1 runs in the main thread.
    /// Any other number creates a thread pool of the specified size.
    pub fn new(n_threads: usize) -> Self {
        match n_threads {
            0 => Self::Thread(ThreadRunner::new()),
            1 => Self::Simple(SimpleRunner),
            n => Self::ThreadPool(ThreadPoolRunner::new(n)),
        }
    }

    pub fn run<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Simple(runner) => runner.run(f),
            Self::Thread(runner) => runner.run(f),
            Self::ThreadPool(runner) => runner.run(f),
        }
    }
}
