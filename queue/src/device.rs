//! Device front end: one accelerator, one owner at a time.

use spin::Mutex;

use crate::config::EngineConfig;
use crate::control::{read_request, Command, UserMemory};
use crate::engine::QueueEngine;
use crate::error::Result;
use crate::hal::{PagePinner, RegisterPort};
use crate::request::Request;
use crate::session::{DeviceSession, Session};
use crate::stats::EngineStats;

/// An accelerator instance: the session gate plus its queue engine.
///
/// The engine lock is the single synchronization point for queue state.
pub struct Accelerator<P: PagePinner, R: RegisterPort> {
    session: DeviceSession,
    engine: Mutex<QueueEngine<P, R>>,
}

impl<P: PagePinner, R: RegisterPort> Accelerator<P, R> {
    pub fn new(engine: QueueEngine<P, R>) -> Self {
        Self {
            session: DeviceSession::new(),
            engine: Mutex::new(engine),
        }
    }

    /// Build the engine and wrap it.
    pub fn with_config(config: EngineConfig, pinner: P, regs: R) -> Result<Self> {
        Ok(Self::new(QueueEngine::new(config, pinner, regs)?))
    }

    /// Open the device exclusively.
    ///
    /// # Returns
    ///
    /// `Busy` while another handle is open.
    pub fn open(&self) -> Result<Handle<'_, P, R>> {
        let session = self.session.acquire()?;
        Ok(Handle {
            _session: session,
            engine: &self.engine,
        })
    }

    /// Check if a handle is currently open.
    pub fn is_open(&self) -> bool {
        !self.session.is_available()
    }

    /// Run `f` with the engine locked.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut QueueEngine<P, R>) -> T) -> T {
        f(&mut *self.engine.lock())
    }

    pub fn into_engine(self) -> QueueEngine<P, R> {
        self.engine.into_inner()
    }
}

/// An open device. Dropping it closes the device.
pub struct Handle<'a, P: PagePinner, R: RegisterPort> {
    _session: Session<'a>,
    engine: &'a Mutex<QueueEngine<P, R>>,
}

impl<P: PagePinner, R: RegisterPort> Handle<'_, P, R> {
    /// Control entry point.
    ///
    /// # Arguments
    ///
    /// * `cmd` - Raw command code
    /// * `arg` - Caller address: the `i32` out-parameter for `Poll`, the
    ///   request record for `Submit`
    /// * `user` - Caller address space
    ///
    /// # Returns
    ///
    /// `Unsupported` for unknown codes with nothing touched; `BadAddress`
    /// if `arg` cannot be accessed; otherwise what the command returns.
    pub fn ioctl<U: UserMemory + ?Sized>(&self, cmd: u32, arg: usize, user: &mut U) -> Result<()> {
        match Command::try_from(cmd)? {
            Command::Poll => {
                let busy = self.poll();
                user.write_i32(arg, busy as i32)
            }
            Command::Submit => {
                let request = read_request(user, arg)?;
                self.submit(request)
            }
        }
    }

    /// Validate, pin and queue a request.
    pub fn submit(&self, request: Request) -> Result<()> {
        self.engine.lock().submit(request)
    }

    /// Run the issue loop; `true` while anything is pending or in flight.
    pub fn poll(&self) -> bool {
        self.engine.lock().poll()
    }

    pub fn stats(&self) -> EngineStats {
        *self.engine.lock().stats()
    }

    /// Close the device.
    pub fn close(self) {}
}
