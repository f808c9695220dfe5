// ─────────────────────────────────────────────────────────────────────────────
// Shims that let `embedded-hal 1.0` bus and delay implementations satisfy the
// *blocking* traits from `embedded-hal 0.2` (needed by the BME680 driver).

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use embedded_hal_02::blocking::delay::DelayMs;
use embedded_hal_02::blocking::i2c::{Read, Write, WriteRead};

pub struct I2cCompat<I2C> {
    pub inner: I2C,
}

impl<I2C> I2cCompat<I2C> {
    pub fn new(inner: I2C) -> Self {
        Self { inner }
    }

    pub fn release(self) -> I2C {
        self.inner
    }
}

impl<I2C: I2c> Write for I2cCompat<I2C> {
    type Error = I2C::Error;
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.inner.write(addr, bytes)
    }
}

impl<I2C: I2c> Read for I2cCompat<I2C> {
    type Error = I2C::Error;
    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.read(addr, buf)
    }
}

impl<I2C: I2c> WriteRead for I2cCompat<I2C> {
    type Error = I2C::Error;
    fn write_read(&mut self, addr: u8, bytes: &[u8], buf: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.write_read(addr, bytes, buf)
    }
}

pub struct DelayCompat<D> {
    pub inner: D,
}

impl<D> DelayCompat<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

impl<D: DelayNs> DelayMs<u8> for DelayCompat<D> {
    fn delay_ms(&mut self, ms: u8) {
        self.inner.delay_ms(ms as u32);
    }
}
// ─────────────────────────────────────────────────────────────────────────────
