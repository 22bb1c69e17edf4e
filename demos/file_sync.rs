use rollsync::{
    BlockHash, DEFAULT_BLOCK_SIZE, OperationStream, Xxh3, apply, make_diff, make_signature,
    serialize_operation,
};
use std::fs::{self, File};
use std::io::{self, Cursor};

fn main() -> io::Result<()> {
    let old_path = "old_file.txt";
    let new_path = "new_file.txt";
    let patched_path = "reconstructed_file.txt";

    // Clean up previous run
    let _ = fs::remove_file(old_path);
    let _ = fs::remove_file(new_path);
    let _ = fs::remove_file(patched_path);

    // 1. Create dummy files
    println!("Creating test files...");
    fs::write(
        old_path,
        b"This is a large-ish file.\nIt has multiple lines.\nSome stay the same.\n",
    )?;
    fs::write(new_path, b"This is a large-ish file.\nIt has CHANGED lines.\nSome stay the same.\nAnd new lines added.\n")?;

    println!("Old file size: {} bytes", fs::metadata(old_path)?.len());
    println!("New file size: {} bytes", fs::metadata(new_path)?.len());

    // 2. Generate the signature of the old file (the receiver's side)
    println!("Generating signature of {old_path}");
    let old_file = File::open(old_path)?;
    let signature: Vec<BlockHash> =
        make_signature(old_file, DEFAULT_BLOCK_SIZE).collect::<io::Result<_>>()?;
    println!("Signature holds {} block hashes", signature.len());

    // 3. Diff the new file against the signature (the sender's side) and
    // encode the operations as they would travel over a wire
    println!("Calculating delta for {new_path}");
    let new_file = File::open(new_path)?;
    let mut differ = make_diff(new_file, signature, DEFAULT_BLOCK_SIZE, Xxh3::new);
    let mut wire = Vec::new();
    let mut op_count = 0usize;
    while let Some(op) = differ.next_op().map_err(io::Error::other)? {
        wire.extend_from_slice(&serialize_operation(&op).map_err(io::Error::other)?);
        op_count += 1;
    }
    println!("Delta contains {op_count} operations, {} bytes on the wire", wire.len());

    // 4. Apply the delta to the old file to reconstruct the new content.
    // 'apply' needs the old file to be seekable to copy matching blocks.
    println!("Applying delta to reconstruct new content at {patched_path}");
    let old_bytes = fs::read(old_path)?;
    let mut patched = File::create(patched_path)?;
    apply(
        wire.as_slice(),
        Cursor::new(old_bytes),
        &mut patched,
        DEFAULT_BLOCK_SIZE,
        Xxh3::new,
    )
    .map_err(io::Error::other)?;

    // 5. Verify
    let reconstructed = fs::read(patched_path)?;
    let wanted = fs::read(new_path)?;
    assert_eq!(reconstructed, wanted, "reconstruction must match the new file");
    println!("Reconstruction verified, {} bytes", reconstructed.len());

    Ok(())
}
