//! Safe wrapper over the opaque client I/O channel
//!
//! The channel is owned by the server; a plugin only borrows it for the
//! duration of one `authenticate` call. Blocking behavior and timeouts
//! belong to the channel, not to this wrapper.

use std::ffi::{c_int, c_uchar};
use std::{ptr, slice};

use dbauth_sys as bindings;
pub use dbauth_sys::vio_protocol as VioProtocol;

/// The channel failed, was closed, or is missing an entry point. Carries
/// no detail; the transport owns its own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VioError;

/// Connection details reported by the channel
#[derive(Debug)]
pub struct VioInfo(bindings::st_plugin_vio_info);

impl VioInfo {
    pub fn protocol(&self) -> VioProtocol {
        self.0.protocol
    }

    /// Connection socket fd, if the transport has one
    pub fn socket(&self) -> Option<i32> {
        (self.0.socket >= 0).then_some(self.0.socket)
    }
}

/// Bidirectional packet channel to the connecting client
#[repr(transparent)]
pub struct Vio(bindings::st_plugin_vio);

impl Vio {
    /// # Safety
    ///
    /// `vio` must point to a valid channel that outlives the returned
    /// reference, with no other live references to it.
    pub unsafe fn from_raw<'a>(vio: *mut bindings::st_plugin_vio) -> &'a mut Self {
        &mut *vio.cast::<Self>()
    }

    /// Read one packet from the client. The returned bytes live in the
    /// channel's internal buffer and are valid until the next read.
    pub fn read_packet(&mut self) -> Result<&[u8], VioError> {
        let Some(read_fn) = self.0.read_packet else {
            return Err(VioError);
        };
        let mut buf: *mut c_uchar = ptr::null_mut();
        // SAFETY: from_raw's caller guaranteed channel validity
        let len = unsafe { read_fn(&mut self.0, &mut buf) };
        if len < 0 {
            return Err(VioError);
        }
        if len == 0 {
            return Ok(&[]);
        }
        if buf.is_null() {
            return Err(VioError);
        }
        // SAFETY: the channel guarantees `buf` valid for `len` bytes
        Ok(unsafe { slice::from_raw_parts(buf.cast::<u8>(), len as usize) })
    }

    /// Send one packet to the client.
    pub fn write_packet(&mut self, packet: &[u8]) -> Result<(), VioError> {
        let Some(write_fn) = self.0.write_packet else {
            return Err(VioError);
        };
        let len: c_int = packet.len().try_into().map_err(|_| VioError)?;
        // SAFETY: from_raw's caller guaranteed channel validity
        let res = unsafe { write_fn(&mut self.0, packet.as_ptr(), len) };
        if res == 0 {
            Ok(())
        } else {
            Err(VioError)
        }
    }

    /// Query connection details from the channel.
    pub fn info(&mut self) -> Result<VioInfo, VioError> {
        let Some(info_fn) = self.0.info else {
            return Err(VioError);
        };
        let mut out = bindings::st_plugin_vio_info {
            protocol: VioProtocol::VIO_PROTO_TCP,
            socket: -1,
        };
        // SAFETY: from_raw's caller guaranteed channel validity
        unsafe { info_fn(&mut self.0, &mut out) };
        Ok(VioInfo(out))
    }
}
