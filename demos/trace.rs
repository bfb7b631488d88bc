use std::io::Read;

use libc::sbrk;
use seglloc::Heap;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  env_logger::init();

  let mut heap = Heap::default();
  heap.init().expect("failed to initialise heap");

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 1) Acquire a small block and write through it.
    // ------------------------------------------------------------------
    let first = heap.acquire(24) as *mut u64;
    println!("\n[1] Acquire 24 bytes -> {:?}", first);
    first.write(0xDEADBEEF);
    println!("[1] Value written = {:#X}", first.read());
    heap.check(line!());
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 2) Acquire a second, larger block. The two should be adjacent,
    //    separated only by each block's own header.
    // ------------------------------------------------------------------
    let second = heap.acquire(128);
    println!("\n[2] Acquire 128 bytes -> {:?}", second);
    heap.check(line!());
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 3) Release the first block, then immediately re-acquire a smaller
    //    size. First-fit over the segregated lists should reuse it.
    // ------------------------------------------------------------------
    heap.release(first as *mut u8);
    println!("\n[3] Released first block");
    block_until_enter_pressed();

    let reused = heap.acquire(8);
    println!(
      "[3] Acquire 8 bytes -> {:?} (reused first block? {})",
      reused,
      reused == first as *mut u8
    );
    heap.check(line!());
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 4) Resize the second block well past its current size, forcing a
    //    relocation, and verify the payload carried over.
    // ------------------------------------------------------------------
    let grown = heap.resize(second, 4096);
    println!(
      "\n[4] Resize 128 -> 4096 bytes: {:?} -> {:?}",
      second, grown
    );
    heap.check(line!());
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 5) Force the heap to extend by requesting something bigger than a
    //    single chunk. Watch the program break move.
    // ------------------------------------------------------------------
    print_program_break("before large acquire");
    let big = heap.acquire(64 * 1024);
    println!("\n[5] Acquire 64 KiB -> {:?}", big);
    print_program_break("after large acquire");
    heap.check(line!());
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 6) Zeroed acquisition.
    // ------------------------------------------------------------------
    let zeroed = heap.zero_acquire(16, 8) as *mut u64;
    println!("\n[6] zero_acquire(16, 8) -> {:?}", zeroed);
    for i in 0..16 {
      assert_eq!(zeroed.add(i).read(), 0);
    }
    println!("[6] all 16 words confirmed zero");
    heap.check(line!());

    println!("\n[7] End of trace. Process exit reclaims everything.");
  }
}
