
// Instruments spoken to over a Session. Only Rigol's DS1000Z scopes so far; if other families
// are added they'll get their own modules here.

pub mod ds1000z;
