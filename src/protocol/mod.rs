pub mod modbus;
pub mod registers;
